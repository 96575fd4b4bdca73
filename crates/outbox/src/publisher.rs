//! Message publishers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::OutboxId;
use domain::OutboxEntry;
use serde::Serialize;

use crate::error::PublishError;

/// What a publisher receives for one outbox entry.
///
/// `id` is the outbox entry id. It is stable across redeliveries, so
/// consumers deduplicate on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: OutboxId,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl From<&OutboxEntry> for OutboxMessage {
    fn from(entry: &OutboxEntry) -> Self {
        Self {
            id: entry.id,
            event_type: entry.event_type.clone(),
            payload: entry.payload.clone(),
        }
    }
}

/// Hands messages to a broker.
///
/// A returned `Ok` means the broker accepted the message; nothing else is
/// read back.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        (**self).publish(message).await
    }
}

/// Publisher that writes each message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        tracing::info!(
            event_id = %message.id,
            event_type = %message.event_type,
            payload = %message.payload,
            "Published event"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OutboxMessage>,
    failing: HashSet<OutboxId>,
    fail_all: bool,
    latency: Option<Duration>,
    attempts: usize,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory publisher for testing, with fault injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns every accepted message, in publish order.
    pub fn published(&self) -> Vec<OutboxMessage> {
        self.lock().published.clone()
    }

    /// Makes every publish fail.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Makes publishing one entry fail.
    pub fn fail_event(&self, id: OutboxId) {
        self.lock().failing.insert(id);
    }

    /// Delays every publish.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Returns how many publishes were attempted.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Returns the largest number of publishes that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        let latency = {
            let mut state = self.lock();
            state.attempts += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        if state.fail_all || state.failing.contains(&message.id) {
            return Err(PublishError::Unavailable(format!(
                "cannot publish {}",
                message.event_type
            )));
        }
        state.published.push(message.clone());
        Ok(())
    }
}
