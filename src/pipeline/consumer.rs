use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::PipelineSettings;
use crate::types::AlertBatch;

use super::BatchHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    /// Upper bound on one blocking wait for the next batch.
    pub poll_timeout: Duration,
    /// Pause after each batch.
    pub cooldown: Duration,
}

impl From<&PipelineSettings> for ConsumerSettings {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            poll_timeout: settings.poll_timeout,
            cooldown: settings.cooldown,
        }
    }
}

/// Owner side of the background consumer task.
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConsumerState>,
    task: JoinHandle<usize>,
}

impl ConsumerHandle {
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    /// Ask the consumer to stop at its next poll or cooldown boundary. A
    /// batch already being processed runs to completion.
    pub fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the consumer to stop. Returns the number of batches left
    /// unprocessed in the queue; those are dropped.
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "alert consumer terminated unexpectedly");
                0
            }
        }
    }

    pub async fn shutdown(self) -> usize {
        self.signal_shutdown();
        self.join().await
    }
}

/// Start the single consumer draining `queue` into `handler`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_consumer<H>(
    queue: Receiver<AlertBatch>,
    handler: Arc<H>,
    settings: ConsumerSettings,
) -> ConsumerHandle
where
    H: BatchHandler + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ConsumerState::Running);
    let task = tokio::spawn(run_consumer(
        queue,
        handler,
        settings,
        shutdown_rx,
        state_tx,
    ));
    ConsumerHandle {
        shutdown: shutdown_tx,
        state: state_rx,
        task,
    }
}

async fn run_consumer<H>(
    queue: Receiver<AlertBatch>,
    handler: Arc<H>,
    settings: ConsumerSettings,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConsumerState>,
) -> usize
where
    H: BatchHandler + 'static,
{
    info!(
        poll_timeout_ms = settings.poll_timeout.as_millis(),
        cooldown_ms = settings.cooldown.as_millis(),
        "alert consumer started"
    );

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let polled = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            polled = timeout(settings.poll_timeout, queue.recv()) => polled,
        };
        let batch = match polled {
            Err(_elapsed) => continue,
            Ok(Err(_closed)) => {
                debug!("alert queue closed");
                break;
            }
            Ok(Ok(batch)) => batch,
        };

        debug!(alerts = batch.len(), "batch dequeued");
        let worker = Arc::clone(&handler);
        // Run in its own task so a panic in one batch does not end the loop.
        if let Err(err) = tokio::spawn(async move { worker.handle(batch).await }).await {
            error!(error = %err, "batch processing aborted");
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            () = sleep(settings.cooldown) => {}
        }
    }

    state.send_replace(ConsumerState::Draining);
    let pending = queue.len();
    if pending > 0 {
        warn!(pending, "alert consumer stopped with unprocessed batches, dropping them");
    }
    state.send_replace(ConsumerState::Stopped);
    info!("alert consumer stopped");
    pending
}

#[cfg(test)]
mod tests {
    use super::{ConsumerSettings, ConsumerState, spawn_consumer};
    use crate::pipeline::BatchHandler;
    use crate::types::AlertBatch;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};

    const FAST: ConsumerSettings = ConsumerSettings {
        poll_timeout: Duration::from_millis(10),
        cooldown: Duration::from_millis(10),
    };

    fn batch(receiver: &str) -> AlertBatch {
        AlertBatch {
            receiver: Some(receiver.to_string()),
            ..AlertBatch::default()
        }
    }

    #[derive(Default)]
    struct GatedHandler {
        calls: AtomicUsize,
        started: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl BatchHandler for GatedHandler {
        async fn handle(&self, _batch: AlertBatch) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.gate.notified().await;
        }
    }

    struct ForwardingHandler {
        seen: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl BatchHandler for ForwardingHandler {
        async fn handle(&self, batch: AlertBatch) {
            let receiver = batch.receiver.unwrap_or_default();
            assert_ne!(receiver, "panic", "handler blew up");
            let _ = self.seen.send(receiver);
        }
    }

    #[tokio::test]
    async fn batches_are_consumed_in_fifo_order() {
        let (tx, rx) = async_channel::unbounded();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let consumer = spawn_consumer(rx, Arc::new(ForwardingHandler { seen: seen_tx }), FAST);

        for name in ["a", "b", "c"] {
            tx.send(batch(name)).await.unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            let next = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
                .await
                .unwrap();
            seen.push(next.unwrap());
        }

        assert_eq!(seen, ["a", "b", "c"]);
        assert_eq!(consumer.shutdown().await, 0);
    }

    #[tokio::test]
    async fn panicking_batch_does_not_stop_the_consumer() {
        let (tx, rx) = async_channel::unbounded();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let consumer = spawn_consumer(rx, Arc::new(ForwardingHandler { seen: seen_tx }), FAST);

        tx.send(batch("panic")).await.unwrap();
        tx.send(batch("after")).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap();

        assert_eq!(next.as_deref(), Some("after"));
        assert_eq!(consumer.state(), ConsumerState::Running);
        consumer.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_lets_the_current_batch_finish_and_leaves_the_rest() {
        let (tx, rx) = async_channel::unbounded();
        for name in ["one", "two", "three"] {
            tx.send(batch(name)).await.unwrap();
        }
        let handler = Arc::new(GatedHandler::default());
        let consumer = spawn_consumer(rx, Arc::clone(&handler), FAST);
        let state = consumer.state_receiver();

        handler.started.notified().await;
        consumer.signal_shutdown();
        handler.gate.notify_one();
        let pending = tokio::time::timeout(Duration::from_secs(5), consumer.join())
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pending, 2);
        assert_eq!(tx.len(), 2);
        assert_eq!(*state.borrow(), ConsumerState::Stopped);
    }

    #[tokio::test]
    async fn idle_consumer_stops_promptly() {
        let (_tx, rx) = async_channel::unbounded();
        let handler = Arc::new(GatedHandler::default());
        let consumer = spawn_consumer(
            rx,
            Arc::clone(&handler),
            ConsumerSettings {
                poll_timeout: Duration::from_secs(30),
                cooldown: Duration::from_secs(30),
            },
        );

        let pending = tokio::time::timeout(Duration::from_secs(5), consumer.shutdown())
            .await
            .unwrap();

        assert_eq!(pending, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
