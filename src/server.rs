//! Inbound webhook endpoint. Handlers only enqueue; processing happens on the
//! consumer task.

use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::Result;
use crate::error::Error;
use crate::types::AlertBatch;

struct AppState {
    queue: Sender<AlertBatch>,
}

pub fn router(queue: Sender<AlertBatch>) -> Router {
    let state = Arc::new(AppState { queue });
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`Error::Server`] when the accept loop fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "webhook server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::Server)
}

async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let batch: AlertBatch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(error = %err, bytes = body.len(), "rejected malformed webhook body");
            return failure(format!("invalid alert payload: {err}"));
        }
    };

    let alerts = batch.len();
    match state.queue.try_send(batch) {
        Ok(()) => {
            info!(alerts, queued = state.queue.len(), "alert batch queued");
            (
                StatusCode::OK,
                Json(json!({"status": "success", "message": "alert batch queued"})),
            )
                .into_response()
        }
        Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
            error!(alerts, "alert queue unavailable, batch rejected");
            failure("alert queue unavailable".to_string())
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

fn failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
