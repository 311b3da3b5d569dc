//! Stored event repository contract and in-memory implementation

use crate::stored::{StoredEvent, StreamQuery};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Stored event repository trait
///
/// Implement this trait to provide durable storage (e.g., PostgreSQL,
/// Cassandra). An implementation must:
///
/// - reject an append with [`RepositoryError::ConcurrencyConflict`] when an
///   event already exists at the same `(entity_id, entity_version)`, checking
///   and inserting atomically;
/// - assign each appended event a strictly increasing `global_sequence`;
/// - only acknowledge an append once it is durable.
///
/// The uniqueness constraint is the whole concurrency control mechanism;
/// callers add no locking of their own.
#[async_trait]
pub trait StoredEventRepository: Send + Sync {
    /// Append several events atomically: all of them or none
    ///
    /// Returns the events with their global sequence assigned. An empty
    /// batch is a no-op.
    async fn append_batch(
        &self,
        events: Vec<StoredEvent>,
    ) -> Result<Vec<StoredEvent>, RepositoryError>;

    /// Events of one entity selected by `query`
    async fn get_entity_events(
        &self,
        entity_id: &str,
        query: &StreamQuery,
    ) -> Result<Vec<StoredEvent>, RepositoryError>;

    /// Events of all entities in global sequence order
    async fn get_all_events(
        &self,
        after_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, RepositoryError>;

    /// Events stored under one topic, in global sequence order
    async fn get_events_by_topic(&self, topic: &str) -> Result<Vec<StoredEvent>, RepositoryError>;

    /// Event by ID
    async fn get_event(&self, event_id: Uuid) -> Result<StoredEvent, RepositoryError>;

    /// Append one event
    async fn append(&self, event: StoredEvent) -> Result<StoredEvent, RepositoryError> {
        self.append_batch(vec![event])
            .await?
            .pop()
            .ok_or_else(|| RepositoryError::Storage("append acknowledged no event".to_string()))
    }

    /// Event at one position of an entity's stream
    async fn get_entity_event(
        &self,
        entity_id: &str,
        version: u64,
    ) -> Result<StoredEvent, RepositoryError> {
        let query = StreamQuery::all().gte(version).lte(version);
        self.get_entity_events(entity_id, &query)
            .await?
            .pop()
            .ok_or_else(|| RepositoryError::NotFound(format!("{}@{}", entity_id, version)))
    }
}

/// Repository error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Concurrency conflict: {entity_id} already has an event at version {version}")]
    ConcurrencyConflict { entity_id: String, version: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Default)]
struct Log {
    /// Every event in global order; sequence is index + 1
    events: Vec<StoredEvent>,

    /// Per-entity index: version -> position in `events`
    streams: HashMap<String, BTreeMap<u64, usize>>,

    /// Event ID -> position in `events`
    ids: HashMap<Uuid, usize>,
}

/// In-memory repository (for testing/development)
#[derive(Clone, Default)]
pub struct InMemoryStoredEventRepository {
    log: Arc<RwLock<Log>>,
}

impl InMemoryStoredEventRepository {
    /// Create new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all events (for testing)
    pub fn all_events(&self) -> Vec<StoredEvent> {
        self.log.read().events.clone()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    /// Check if nothing was appended
    pub fn is_empty(&self) -> bool {
        self.log.read().events.is_empty()
    }

    /// Clear all data
    pub fn clear(&self) {
        let mut log = self.log.write();
        log.events.clear();
        log.streams.clear();
        log.ids.clear();
    }
}

#[async_trait]
impl StoredEventRepository for InMemoryStoredEventRepository {
    async fn append_batch(
        &self,
        events: Vec<StoredEvent>,
    ) -> Result<Vec<StoredEvent>, RepositoryError> {
        let mut log = self.log.write();

        // Validate the whole batch before touching the log
        {
            let mut claimed = HashSet::new();
            for event in &events {
                let taken = log
                    .streams
                    .get(&event.entity_id)
                    .is_some_and(|stream| stream.contains_key(&event.entity_version));
                if taken || !claimed.insert((event.entity_id.as_str(), event.entity_version)) {
                    return Err(RepositoryError::ConcurrencyConflict {
                        entity_id: event.entity_id.clone(),
                        version: event.entity_version,
                    });
                }
                if log.ids.contains_key(&event.event_id) {
                    return Err(RepositoryError::Storage(format!(
                        "duplicate event id {}",
                        event.event_id
                    )));
                }
            }
        }

        let mut appended = Vec::with_capacity(events.len());
        for event in events {
            let index = log.events.len();
            let event = event.sequenced(index as u64 + 1);
            log.streams
                .entry(event.entity_id.clone())
                .or_default()
                .insert(event.entity_version, index);
            log.ids.insert(event.event_id, index);
            log.events.push(event.clone());
            appended.push(event);
        }

        Ok(appended)
    }

    async fn get_entity_events(
        &self,
        entity_id: &str,
        query: &StreamQuery,
    ) -> Result<Vec<StoredEvent>, RepositoryError> {
        let log = self.log.read();
        let Some(stream) = log.streams.get(entity_id) else {
            return Ok(Vec::new());
        };

        let ordered: Vec<&StoredEvent> = stream.values().map(|i| &log.events[*i]).collect();
        Ok(query.select(ordered))
    }

    async fn get_all_events(
        &self,
        after_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, RepositoryError> {
        let log = self.log.read();
        let start = after_sequence
            .map(|s| (s as usize).min(log.events.len()))
            .unwrap_or(0);

        Ok(log.events[start..]
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_events_by_topic(&self, topic: &str) -> Result<Vec<StoredEvent>, RepositoryError> {
        Ok(self
            .log
            .read()
            .events
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect())
    }

    async fn get_event(&self, event_id: Uuid) -> Result<StoredEvent, RepositoryError> {
        let log = self.log.read();
        log.ids
            .get(&event_id)
            .map(|i| log.events[*i].clone())
            .ok_or_else(|| RepositoryError::NotFound(event_id.to_string()))
    }
}
