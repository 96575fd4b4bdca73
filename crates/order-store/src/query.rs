use domain::OutboxStatus;

/// Filter for inspecting outbox entries.
///
/// Results are always ordered oldest first.
#[derive(Debug, Clone, Default)]
pub struct OutboxQuery {
    /// Filter by delivery status.
    pub status: Option<OutboxStatus>,

    /// Filter by event name.
    pub event_type: Option<String>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl OutboxQuery {
    /// Creates a query matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for entries in one status.
    pub fn with_status(status: OutboxStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Filters by delivery status.
    pub fn status(mut self, status: OutboxStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by event name.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Limits the number of entries returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many entries before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn matches(&self, entry: &domain::OutboxEntry) -> bool {
        if let Some(status) = self.status
            && entry.status != status
        {
            return false;
        }
        if let Some(ref event_type) = self.event_type
            && &entry.event_type != event_type
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OutboxEntry;

    #[test]
    fn query_with_status() {
        let query = OutboxQuery::with_status(OutboxStatus::Failed);
        assert_eq!(query.status, Some(OutboxStatus::Failed));
        assert!(query.event_type.is_none());
    }

    #[test]
    fn query_builder_chain() {
        let query = OutboxQuery::new()
            .status(OutboxStatus::Pending)
            .event_type("order.created")
            .limit(10)
            .offset(5);

        assert_eq!(query.status, Some(OutboxStatus::Pending));
        assert_eq!(query.event_type.as_deref(), Some("order.created"));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }

    #[test]
    fn query_matches_filters() {
        let entry = OutboxEntry::pending("order.created", serde_json::json!({}));

        assert!(OutboxQuery::new().matches(&entry));
        assert!(OutboxQuery::with_status(OutboxStatus::Pending).matches(&entry));
        assert!(!OutboxQuery::with_status(OutboxStatus::Failed).matches(&entry));
        assert!(!OutboxQuery::new().event_type("order.paid").matches(&entry));
    }
}
