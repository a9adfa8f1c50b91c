//! Rate-limited, ordered progress notifications.
//!
//! Evaluators enqueue [`ProgressEvent`]s through a cloneable [`Notifier`];
//! a single consumer task renders and posts them in enqueue order, at most
//! one post per interval. `Started` events are dropped when the buffer is
//! full; `Completed` and `Failed` wait for room until the run is cancelled.
//! Posting is best effort: failures are logged and counted, never retried
//! and never reported back to producers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collaborators::NotificationTransport;
use crate::domain::{NotifyTarget, ProgressEvent};
use crate::obs;

/// Notification sink tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Minimum spacing between two posts (milliseconds).
    pub interval_ms: u64,
    /// Events buffered before producers start dropping.
    pub capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            capacity: 100,
        }
    }
}

impl NotifyConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Delivery bookkeeping of one sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    /// Events dropped at enqueue because the buffer was full.
    pub dropped: u64,
}

/// Producer handle. Cheap to clone; a disabled notifier discards events.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Notifier {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueue without waiting. A full buffer drops the event.
    pub fn notify(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %event.key(), "notification buffer full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(key = %event.key(), "notification sink stopped, dropping event");
            }
        }
    }

    /// Enqueue, waiting for buffer space. Gives up only when `cancel` fires
    /// or the sink has stopped.
    pub async fn send(&self, event: ProgressEvent, cancel: &CancellationToken) {
        let Some(tx) = &self.tx else {
            return;
        };
        let key = event.key().to_string();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key = %key, "run cancelled, dropping event");
            }
            sent = tx.send(event) => {
                if sent.is_err() {
                    debug!(key = %key, "notification sink stopped, dropping event");
                }
            }
        }
    }
}

/// Owner of the consumer task.
///
/// [`close`](Self::close) waits until every [`Notifier`] handed out has been
/// dropped and the buffer is drained, so close only after all producers are
/// done.
pub struct NotificationSink {
    notifier: Notifier,
    worker: Option<JoinHandle<DeliveryStats>>,
}

impl NotificationSink {
    /// Spawn the consumer task. It stops early when `cancel` fires.
    pub fn start(
        transport: Arc<dyn NotificationTransport>,
        target: NotifyTarget,
        config: &NotifyConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let worker = tokio::spawn(deliver(
            rx,
            transport,
            target,
            config.interval(),
            cancel,
        ));
        Self {
            notifier: Notifier {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            worker: Some(worker),
        }
    }

    /// A sink that accepts and discards everything.
    pub fn disabled() -> Self {
        Self {
            notifier: Notifier::disabled(),
            worker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.worker.is_some()
    }

    pub fn handle(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Stop accepting events, drain the buffer and return delivery stats.
    pub async fn close(self) -> DeliveryStats {
        let Self { notifier, worker } = self;
        let dropped = notifier.dropped.load(Ordering::Relaxed);
        drop(notifier);

        let Some(worker) = worker else {
            return DeliveryStats::default();
        };
        let mut stats = match worker.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "notification worker ended abnormally");
                DeliveryStats::default()
            }
        };
        stats.dropped = dropped;
        stats
    }
}

async fn deliver(
    mut rx: mpsc::Receiver<ProgressEvent>,
    transport: Arc<dyn NotificationTransport>,
    target: NotifyTarget,
    interval: Duration,
    cancel: CancellationToken,
) -> DeliveryStats {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = DeliveryStats::default();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let text = event.render();
        let posted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            posted = transport.post(&target.channel, target.thread_ts.as_deref(), &text) => posted,
        };
        match posted {
            Ok(()) => stats.delivered += 1,
            Err(err) => {
                stats.failed += 1;
                obs::emit_notification_failed(event.key(), &err);
            }
        }
    }

    debug!(
        delivered = stats.delivered,
        failed = stats.failed,
        "notification worker stopped"
    );
    stats
}
