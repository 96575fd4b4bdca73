//! Outbox entries: events recorded alongside the domain write that caused them.

use chrono::{DateTime, Utc};
use common::OutboxId;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::DomainError;
use crate::events::OutboxEvent;

/// Delivery status of an outbox entry.
///
/// ```text
/// Pending ──► Processed
///    │
///    └──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Awaiting publication.
    #[default]
    Pending,

    /// Handed to the broker.
    Processed,

    /// Publication raised an error. Not retried automatically.
    Failed,
}

impl OutboxStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processed => "PROCESSED",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutboxStatus::Pending),
            "PROCESSED" => Ok(OutboxStatus::Processed),
            "FAILED" => Ok(OutboxStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of one publication attempt, recorded by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxDisposition {
    /// The broker accepted the message.
    Processed { at: DateTime<Utc> },

    /// Publishing raised; the message is kept for inspection.
    Failed { error: String },
}

impl OutboxDisposition {
    /// A successful publication at the current time.
    pub fn processed_now() -> Self {
        OutboxDisposition::Processed { at: clock::now() }
    }

    /// A failed publication with the error's message.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        OutboxDisposition::Failed {
            error: error.to_string(),
        }
    }

    /// The status this disposition moves an entry to.
    pub fn status(&self) -> OutboxStatus {
        match self {
            OutboxDisposition::Processed { .. } => OutboxStatus::Processed,
            OutboxDisposition::Failed { .. } => OutboxStatus::Failed,
        }
    }
}

/// An event waiting to be published, stored in the same transaction as the
/// write that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OutboxEntry {
    /// Creates a new pending entry with a raw payload.
    pub fn pending(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: OutboxId::new(),
            event_type: event_type.into(),
            payload,
            status: OutboxStatus::Pending,
            created_at: clock::now(),
            processed_at: None,
            error: None,
        }
    }

    /// Creates a new pending entry for a typed event.
    pub fn for_event<E: OutboxEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self::pending(E::EVENT_TYPE, serde_json::to_value(event)?))
    }

    /// Records the outcome of a publication attempt.
    pub fn apply(&mut self, disposition: &OutboxDisposition) {
        self.status = disposition.status();
        match disposition {
            OutboxDisposition::Processed { at } => {
                self.processed_at = Some(*at);
                self.error = None;
            }
            OutboxDisposition::Failed { error } => {
                self.error = Some(error.clone());
            }
        }
    }

    /// Puts a failed entry back in the queue.
    pub fn requeue(&mut self) {
        self.status = OutboxStatus::Pending;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_entry_defaults() {
        let entry = OutboxEntry::pending("order.created", serde_json::json!({"a": 1}));
        assert_eq!(entry.status, OutboxStatus::Pending);
        assert!(entry.processed_at.is_none());
        assert!(entry.error.is_none());
    }

    #[test]
    fn test_apply_processed_sets_timestamp() {
        let mut entry = OutboxEntry::pending("order.created", serde_json::json!({}));
        entry.apply(&OutboxDisposition::processed_now());
        assert_eq!(entry.status, OutboxStatus::Processed);
        assert!(entry.processed_at.is_some());
    }

    #[test]
    fn test_apply_failed_then_requeue() {
        let mut entry = OutboxEntry::pending("order.created", serde_json::json!({}));
        entry.apply(&OutboxDisposition::failed("broker down"));
        assert_eq!(entry.status, OutboxStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("broker down"));
        assert!(entry.processed_at.is_none());

        entry.requeue();
        assert_eq!(entry.status, OutboxStatus::Pending);
        assert!(entry.error.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("FAILED".parse::<OutboxStatus>(), Ok(OutboxStatus::Failed));
        assert!("DONE".parse::<OutboxStatus>().is_err());
    }
}
