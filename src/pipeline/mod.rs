//! Queue-fed alert processing: identity dedup, notification and image delivery.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::types::{Alert, AlertBatch, AlertContext};

mod consumer;
mod identity;
mod processor;

pub use consumer::{ConsumerHandle, ConsumerSettings, ConsumerState, spawn_consumer};
pub use identity::{InFlight, InFlightGuard, compute_identity};
pub use processor::{AlertOutcome, AlertProcessor, ImageOutcome};

/// Delivery side of the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, alert: &Alert) -> Result<()>;
    async fn push_image(&self, path: &Path) -> Result<()>;
}

/// Produces a panel screenshot for an alert. `None` means no image, either
/// because the alert names no panel or because rendering failed.
#[async_trait]
pub trait PanelRenderer: Send + Sync {
    async fn fetch_panel_image(&self, ctx: &AlertContext) -> Option<PathBuf>;
}

/// What the consumer hands each dequeued batch to.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, batch: AlertBatch);
}
