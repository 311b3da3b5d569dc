//! Stored events and stream queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable, serialized record of one domain event
///
/// Stored events are immutable once appended. `global_sequence` is `None`
/// until a repository assigns it at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Globally unique event ID
    pub event_id: Uuid,

    /// Entity ID
    pub entity_id: String,

    /// Position in the entity's stream, starting at 0
    pub entity_version: u64,

    /// Stable name of the event kind
    pub topic: String,

    /// Kind-specific fields
    pub payload: serde_json::Value,

    /// When the domain event was produced
    pub timestamp: DateTime<Utc>,

    /// Position in the global log, assigned by the repository
    pub global_sequence: Option<u64>,
}

impl StoredEvent {
    /// Copy of this record carrying its global position
    pub fn sequenced(mut self, sequence: u64) -> Self {
        self.global_sequence = Some(sequence);
        self
    }
}

/// Ordering of a stream query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Version window over one entity's stream
///
/// `query_order` decides which end a `limit` is taken from; `result_order`
/// decides how the selected events are returned. A descending query with
/// ascending results therefore yields the last `limit` events, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamQuery {
    pub gt: Option<u64>,
    pub gte: Option<u64>,
    pub lt: Option<u64>,
    pub lte: Option<u64>,
    pub limit: Option<usize>,
    pub query_order: Order,
    pub result_order: Order,
}

impl StreamQuery {
    /// Whole stream, ascending
    pub fn all() -> Self {
        Self::default()
    }

    /// Events after `version`, ascending
    pub fn after(version: u64) -> Self {
        Self::default().gt(version)
    }

    /// Versions strictly greater than `version`
    pub fn gt(mut self, version: u64) -> Self {
        self.gt = Some(version);
        self
    }

    /// Versions greater than or equal to `version`
    pub fn gte(mut self, version: u64) -> Self {
        self.gte = Some(version);
        self
    }

    /// Versions strictly less than `version`
    pub fn lt(mut self, version: u64) -> Self {
        self.lt = Some(version);
        self
    }

    /// Versions less than or equal to `version`
    pub fn lte(mut self, version: u64) -> Self {
        self.lte = Some(version);
        self
    }

    /// At most `limit` events
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// End of the window the limit is taken from
    pub fn query_order(mut self, order: Order) -> Self {
        self.query_order = order;
        self
    }

    /// Order of the returned events
    pub fn result_order(mut self, order: Order) -> Self {
        self.result_order = order;
        self
    }

    /// Shorthand for the last events of a stream, newest first
    pub fn latest(limit: usize) -> Self {
        Self::default()
            .limit(limit)
            .query_order(Order::Descending)
            .result_order(Order::Descending)
    }

    /// Whether a version falls inside the bounds
    pub fn contains(&self, version: u64) -> bool {
        self.gt.is_none_or(|v| version > v)
            && self.gte.is_none_or(|v| version >= v)
            && self.lt.is_none_or(|v| version < v)
            && self.lte.is_none_or(|v| version <= v)
    }

    /// Apply the query to a stream held in ascending version order
    ///
    /// Backends without native range support can fetch the stream and
    /// delegate here.
    pub fn select<'a, I>(&self, stream: I) -> Vec<StoredEvent>
    where
        I: IntoIterator<Item = &'a StoredEvent>,
        I::IntoIter: DoubleEndedIterator,
    {
        let limit = self.limit.unwrap_or(usize::MAX);
        let matching = stream
            .into_iter()
            .filter(|e| self.contains(e.entity_version));

        let mut selected: Vec<StoredEvent> = match self.query_order {
            Order::Ascending => matching.take(limit).cloned().collect(),
            Order::Descending => {
                let mut tail: Vec<StoredEvent> = matching.rev().take(limit).cloned().collect();
                tail.reverse();
                tail
            }
        };

        if self.result_order == Order::Descending {
            selected.reverse();
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(versions: std::ops::Range<u64>) -> Vec<StoredEvent> {
        versions
            .map(|v| StoredEvent {
                event_id: Uuid::new_v4(),
                entity_id: "e-1".to_string(),
                entity_version: v,
                topic: "test#Changed".to_string(),
                payload: serde_json::json!({ "v": v }),
                timestamp: Utc::now(),
                global_sequence: None,
            })
            .collect()
    }

    fn versions(events: &[StoredEvent]) -> Vec<u64> {
        events.iter().map(|e| e.entity_version).collect()
    }

    #[test]
    fn test_bounds() {
        let events = stream(0..3);

        assert_eq!(versions(&StreamQuery::after(0).select(&events)), vec![1, 2]);
        assert_eq!(versions(&StreamQuery::all().gte(1).select(&events)), vec![1, 2]);
        assert_eq!(versions(&StreamQuery::all().lt(2).select(&events)), vec![0, 1]);
        assert_eq!(versions(&StreamQuery::all().lte(1).select(&events)), vec![0, 1]);
        assert_eq!(
            versions(&StreamQuery::all().gte(1).lte(1).select(&events)),
            vec![1]
        );
        assert_eq!(
            versions(&StreamQuery::all().gt(0).lt(2).select(&events)),
            vec![1]
        );
    }

    #[test]
    fn test_limit_from_either_end() {
        let events = stream(0..3);

        let first = StreamQuery::all().limit(1).select(&events);
        assert_eq!(versions(&first), vec![0]);

        let last_two = StreamQuery::all()
            .limit(2)
            .query_order(Order::Descending)
            .select(&events);
        assert_eq!(versions(&last_two), vec![1, 2]);

        let last_after_one = StreamQuery::all()
            .gt(1)
            .limit(2)
            .query_order(Order::Descending)
            .select(&events);
        assert_eq!(versions(&last_after_one), vec![2]);

        let before_two = StreamQuery::all()
            .lt(2)
            .limit(2)
            .query_order(Order::Descending)
            .select(&events);
        assert_eq!(versions(&before_two), vec![0, 1]);
    }

    #[test]
    fn test_result_order() {
        let events = stream(0..3);

        let newest_first = StreamQuery::all()
            .result_order(Order::Descending)
            .select(&events);
        assert_eq!(versions(&newest_first), vec![2, 1, 0]);

        assert_eq!(versions(&StreamQuery::latest(1).select(&events)), vec![2]);
    }

    #[test]
    fn test_sequenced() {
        let event = stream(0..1).remove(0).sequenced(7);
        assert_eq!(event.global_sequence, Some(7));
    }
}
