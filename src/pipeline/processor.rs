use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::types::{Alert, AlertBatch, AlertContext};

use super::identity::{InFlight, compute_identity};
use super::{BatchHandler, Notifier, PanelRenderer};

/// Result of one alert's pass through the processor.
#[derive(Debug)]
pub enum AlertOutcome {
    Delivered { image: ImageOutcome },
    /// Another pass holds the same identity.
    Skipped,
    /// The text notification failed; the alert is dropped.
    Failed(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    NotRequested,
    Unavailable,
    Pushed,
    PushFailed,
}

pub struct AlertProcessor {
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn PanelRenderer>,
    in_flight: InFlight,
    settle_delay: Duration,
}

impl AlertProcessor {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn PanelRenderer>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            notifier,
            renderer,
            in_flight: InFlight::new(),
            settle_delay,
        }
    }

    /// Share an existing in-flight set, e.g. between processors in tests.
    #[must_use]
    pub fn with_in_flight(mut self, in_flight: InFlight) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub const fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Process every alert of `batch` in order. One alert's failure never
    /// stops the rest of the batch.
    pub async fn process(&self, batch: &AlertBatch) -> Vec<AlertOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for alert in &batch.alerts {
            let outcome = self.process_alert(alert).await;
            log_outcome(alert, &outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn process_alert(&self, alert: &Alert) -> AlertOutcome {
        let identity = compute_identity(alert);
        let Some(guard) = self.in_flight.try_acquire(identity.as_str()) else {
            debug!(%identity, "identity already in flight");
            return AlertOutcome::Skipped;
        };
        debug!(identity = guard.identity(), "identity acquired");

        if let Err(err) = self.notifier.send_text(alert).await {
            return AlertOutcome::Failed(err);
        }

        let ctx = AlertContext::from_alert(alert);
        if ctx.panel_id.is_none() {
            return AlertOutcome::Delivered {
                image: ImageOutcome::NotRequested,
            };
        }
        let Some(path) = self.renderer.fetch_panel_image(&ctx).await else {
            return AlertOutcome::Delivered {
                image: ImageOutcome::Unavailable,
            };
        };

        let image = match self.notifier.push_image(&path).await {
            Ok(()) => ImageOutcome::Pushed,
            Err(err) => {
                warn!(
                    alertname = %ctx.alert_name,
                    path = %path.display(),
                    error = %err,
                    "image push failed"
                );
                ImageOutcome::PushFailed
            }
        };

        sleep(self.settle_delay).await;
        remove_image(&path).await;

        AlertOutcome::Delivered { image }
    }
}

#[async_trait]
impl BatchHandler for AlertProcessor {
    async fn handle(&self, batch: AlertBatch) {
        let outcomes = self.process(&batch).await;
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, AlertOutcome::Failed(_)))
            .count();
        info!(alerts = outcomes.len(), failed, "batch processed");
    }
}

async fn remove_image(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "panel image removed"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove panel image"),
    }
}

fn log_outcome(alert: &Alert, outcome: &AlertOutcome) {
    let ctx = AlertContext::from_alert(alert);
    match outcome {
        AlertOutcome::Delivered { image } => info!(
            alertname = %ctx.alert_name,
            instance = %ctx.instance,
            image = ?image,
            "alert processed"
        ),
        AlertOutcome::Skipped => info!(
            alertname = %ctx.alert_name,
            instance = %ctx.instance,
            "alert already in flight, skipped"
        ),
        AlertOutcome::Failed(err) => error!(
            alertname = %ctx.alert_name,
            instance = %ctx.instance,
            error = %err,
            "text notification failed, alert dropped"
        ),
    }
}
