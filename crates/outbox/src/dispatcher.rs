//! Periodic outbox sweeps.

use std::time::{Duration, Instant};

use domain::{OutboxDisposition, OutboxEntry};
use order_store::OutboxStore;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Result;
use crate::publisher::{EventPublisher, OutboxMessage};

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Time between the starts of two sweeps.
    pub interval: Duration,

    /// Maximum number of entries handled per sweep.
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 10,
        }
    }
}

impl DispatcherConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pending entries read from the store.
    pub fetched: usize,

    /// Entries the publisher accepted.
    pub published: usize,

    /// Entries the publisher refused.
    pub failed: usize,
}

/// Publishes pending outbox entries and records their disposition.
///
/// Sweeps run one at a time: [`OutboxDispatcher::run`] awaits each sweep
/// before waiting for the next tick, and ticks missed meanwhile are dropped.
pub struct OutboxDispatcher<S: OutboxStore, P: EventPublisher> {
    store: S,
    publisher: P,
    config: DispatcherConfig,
}

impl<S: OutboxStore, P: EventPublisher> OutboxDispatcher<S, P> {
    pub fn new(store: S, publisher: P, config: DispatcherConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Publishes up to `batch_size` pending entries, oldest first.
    ///
    /// A publish failure marks that entry `FAILED` and moves on to the next
    /// one. Only a failure to read the pending batch is returned as an error.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let started = Instant::now();
        metrics::counter!("outbox_sweeps_total").increment(1);

        let entries = self
            .store
            .list_pending_outbox(self.config.batch_size)
            .await?;
        let mut report = SweepReport {
            fetched: entries.len(),
            ..SweepReport::default()
        };
        if entries.is_empty() {
            return Ok(report);
        }

        tracing::info!(count = entries.len(), "Processing outbox entries");

        for entry in &entries {
            if self.dispatch(entry).await {
                report.published += 1;
            } else {
                report.failed += 1;
            }
        }

        metrics::histogram!("outbox_sweep_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            published = report.published,
            failed = report.failed,
            "Outbox sweep complete"
        );

        Ok(report)
    }

    /// Publishes one entry and records the outcome. Returns whether the
    /// publisher accepted it.
    async fn dispatch(&self, entry: &OutboxEntry) -> bool {
        let message = OutboxMessage::from(entry);

        let (disposition, accepted) = match self.publisher.publish(&message).await {
            Ok(()) => {
                metrics::counter!("outbox_entries_published_total").increment(1);
                (OutboxDisposition::processed_now(), true)
            }
            Err(err) => {
                metrics::counter!("outbox_entries_failed_total").increment(1);
                tracing::error!(
                    entry_id = %entry.id,
                    event_type = %entry.event_type,
                    error = %err,
                    "Failed to publish outbox entry"
                );
                (OutboxDisposition::failed(&err), false)
            }
        };

        // The entry stays PENDING and is published again on a later sweep.
        if let Err(err) = self.store.update_outbox_status(entry.id, &disposition).await {
            tracing::error!(
                entry_id = %entry.id,
                status = %disposition.status(),
                error = %err,
                "Failed to record outbox entry status"
            );
        }

        accepted
    }

    /// Sweeps on every tick until `shutdown` turns true or its sender is
    /// dropped. A sweep in progress always completes first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Outbox dispatcher started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(err) = self.sweep().await {
                tracing::error!(error = %err, "Outbox sweep failed");
            }
        }

        tracing::info!("Outbox dispatcher stopped");
    }
}

impl<S, P> OutboxDispatcher<S, P>
where
    S: OutboxStore + 'static,
    P: EventPublisher + 'static,
{
    /// Runs the dispatcher as a background task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryPublisher;
    use order_store::InMemoryOrderStore;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 10);

        let config = config
            .with_interval(Duration::from_millis(250))
            .with_batch_size(3);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.batch_size, 3);
    }

    #[tokio::test]
    async fn test_empty_sweep() {
        let dispatcher = OutboxDispatcher::new(
            InMemoryOrderStore::new(),
            InMemoryPublisher::new(),
            DispatcherConfig::default(),
        );

        assert_eq!(dispatcher.sweep().await.unwrap(), SweepReport::default());
    }
}
