//! Event store: domain events in, domain events out

use crate::codec::EventCodec;
use crate::error::{EventSourcingError, Result};
use crate::reader::StreamReader;
use crate::store::{RepositoryError, StoredEventRepository};
use crate::stored::{Order, StoredEvent, StreamQuery};
use chronicle_events::{DomainEvent, TopicRegistry};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Event store configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventStoreConfig {
    /// Log appends and reads
    pub enable_logging: bool,

    /// Read streams in pages of this size instead of all at once
    pub page_size: Option<usize>,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            page_size: None,
        }
    }
}

/// Event store
///
/// Wraps a [`StoredEventRepository`] with a codec for one domain event type.
/// An append must continue its entity's stream: a version past the next free
/// one fails with [`EventSourcingError::Integrity`] and nothing is written.
/// Stored events are never changed, so that check needs no lock; the
/// repository's uniqueness constraint on `(entity_id, entity_version)` is what
/// rejects a concurrent writer.
pub struct EventStore<E, R: ?Sized> {
    repository: Arc<R>,
    codec: EventCodec<E>,
    config: EventStoreConfig,
}

impl<E, R> EventStore<E, R>
where
    E: DomainEvent,
    R: StoredEventRepository + ?Sized,
{
    /// Create event store
    ///
    /// Fails unless every kind of `E` has a topic in `registry`.
    pub fn new(repository: Arc<R>, registry: Arc<TopicRegistry>) -> Result<Self> {
        Self::with_config(repository, registry, EventStoreConfig::default())
    }

    /// Create event store with configuration
    pub fn with_config(
        repository: Arc<R>,
        registry: Arc<TopicRegistry>,
        config: EventStoreConfig,
    ) -> Result<Self> {
        registry.ensure_registered::<E>()?;
        Ok(Self {
            repository,
            codec: EventCodec::new(registry),
            config,
        })
    }

    /// Underlying repository
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Codec used for every read and write
    pub fn codec(&self) -> &EventCodec<E> {
        &self.codec
    }

    /// Configuration
    pub fn config(&self) -> &EventStoreConfig {
        &self.config
    }

    /// Append one domain event
    ///
    /// Fails with [`EventSourcingError::OptimisticConcurrency`] if the entity
    /// already has an event at this version, and with
    /// [`EventSourcingError::Integrity`] if the version would leave a gap.
    /// The append is not retried.
    pub async fn append(&self, event: &E) -> Result<StoredEvent> {
        let stored = self.codec.serialize(event)?;
        let (entity_id, version) = (stored.entity_id.clone(), stored.entity_version);

        let expected = self.next_version(&entity_id).await?;
        check_continues(&entity_id, expected, version)?;

        match self.repository.append(stored).await {
            Ok(stored) => {
                if self.config.enable_logging {
                    debug!(
                        "Appended {} to {}@{} (sequence {:?})",
                        stored.topic, entity_id, version, stored.global_sequence
                    );
                }
                Ok(stored)
            }
            Err(err) => Err(self.append_failed(err)),
        }
    }

    /// Append several domain events atomically
    ///
    /// Each entity's events must continue its stream in batch order.
    pub async fn append_all(&self, events: &[E]) -> Result<Vec<StoredEvent>> {
        let stored = events
            .iter()
            .map(|e| self.codec.serialize(e))
            .collect::<Result<Vec<_>>>()?;

        let mut next: HashMap<&str, u64> = HashMap::new();
        for event in &stored {
            let expected = match next.get(event.entity_id.as_str()) {
                Some(version) => *version,
                None => self.next_version(&event.entity_id).await?,
            };
            check_continues(&event.entity_id, expected, event.entity_version)?;
            let after = event.entity_version.saturating_add(1);
            next.insert(event.entity_id.as_str(), expected.max(after));
        }

        match self.repository.append_batch(stored).await {
            Ok(appended) => {
                if self.config.enable_logging {
                    debug!("Appended batch of {} events", appended.len());
                }
                Ok(appended)
            }
            Err(err) => Err(self.append_failed(err)),
        }
    }

    /// Version the entity's next event must carry
    async fn next_version(&self, entity_id: &str) -> Result<u64> {
        let head = self
            .repository
            .get_entity_events(entity_id, &StreamQuery::latest(1))
            .await?;
        Ok(head
            .first()
            .map_or(0, |s| s.entity_version.saturating_add(1)))
    }

    fn append_failed(&self, err: RepositoryError) -> EventSourcingError {
        match &err {
            RepositoryError::ConcurrencyConflict { entity_id, version } => {
                warn!(
                    "Concurrency conflict on {}@{}: another writer appended first",
                    entity_id, version
                );
            }
            other => {
                error!("Append failed: {}", other);
            }
        }
        err.into()
    }

    /// Domain events of one entity in version order
    ///
    /// With `after_version`, only events with a greater version are returned.
    /// A gap in the stream fails with [`EventSourcingError::Integrity`].
    pub async fn get_domain_events(
        &self,
        entity_id: &str,
        after_version: Option<u64>,
    ) -> Result<Vec<E>> {
        let (query, first) = match after_version {
            Some(version) => match version.checked_add(1) {
                Some(first) => (StreamQuery::after(version), first),
                None => return Ok(Vec::new()),
            },
            None => (StreamQuery::all(), 0),
        };
        let stored = self.repository.get_entity_events(entity_id, &query).await?;

        check_contiguous(entity_id, &stored, first, Order::Ascending)?;

        if self.config.enable_logging {
            debug!("Read {} events of {}", stored.len(), entity_id);
        }
        self.decode_all(&stored)
    }

    /// Domain events of one entity selected by `query`
    ///
    /// Consecutive results must have adjacent versions; where the stream
    /// starts is up to the query.
    pub async fn query_domain_events(&self, entity_id: &str, query: &StreamQuery) -> Result<Vec<E>> {
        let stored = self.repository.get_entity_events(entity_id, query).await?;
        if let Some(head) = stored.first() {
            check_contiguous(entity_id, &stored, head.entity_version, query.result_order)?;
        }
        self.decode_all(&stored)
    }

    /// Domain event at one version
    pub async fn get_domain_event(&self, entity_id: &str, version: u64) -> Result<E> {
        let stored = self.repository.get_entity_event(entity_id, version).await?;
        self.decode(&stored)
    }

    /// Latest domain event of an entity, if it has any
    pub async fn get_most_recent_event(&self, entity_id: &str) -> Result<Option<E>> {
        let mut stored = self
            .repository
            .get_entity_events(entity_id, &StreamQuery::latest(1))
            .await?;
        stored.pop().map(|s| self.decode(&s)).transpose()
    }

    /// Domain events of all entities of this type, in global order
    ///
    /// The page is taken from the whole log, so it may hold fewer matching
    /// events than `limit` when other event types are interleaved. A topic
    /// bound to nothing fails the read instead of being skipped.
    pub async fn get_all_domain_events(
        &self,
        after_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<E>> {
        let stored = self.repository.get_all_events(after_sequence, limit).await?;
        let mut events = Vec::with_capacity(stored.len());
        for s in &stored {
            if self.handles(s)? {
                events.push(self.decode(s)?);
            }
        }
        Ok(events)
    }

    /// Paged reader over one entity's stream
    pub fn reader<'a>(&'a self, entity_id: &'a str, page_size: usize) -> StreamReader<'a, E, R> {
        StreamReader::new(self, entity_id, page_size)
    }

    /// Decode one stored event
    pub fn decode(&self, stored: &StoredEvent) -> Result<E> {
        self.codec.deserialize(stored).inspect_err(|e| {
            error!(
                "Failed to decode {}@{} ({}): {}",
                stored.entity_id, stored.entity_version, stored.topic, e
            );
        })
    }

    /// Whether a stored event belongs to this store's event type
    pub fn handles(&self, stored: &StoredEvent) -> Result<bool> {
        self.codec.handles(stored).inspect_err(|e| {
            error!(
                "Cannot resolve {}@{} ({}): {}",
                stored.entity_id, stored.entity_version, stored.topic, e
            );
        })
    }

    fn decode_all(&self, stored: &[StoredEvent]) -> Result<Vec<E>> {
        stored.iter().map(|s| self.decode(s)).collect()
    }
}

/// Check that an event at `found` does not skip past `expected`
///
/// A version below `expected` is left to the repository, which reports it as
/// a concurrency conflict.
fn check_continues(entity_id: &str, expected: u64, found: u64) -> Result<()> {
    if found > expected {
        error!(
            "Refusing to append {}@{}: next version is {}",
            entity_id, found, expected
        );
        return Err(EventSourcingError::Integrity {
            entity_id: entity_id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Check that versions step by one from `first` in the given direction
pub(crate) fn check_contiguous(
    entity_id: &str,
    stored: &[StoredEvent],
    first: u64,
    order: Order,
) -> Result<()> {
    let mut expected = first;
    for event in stored {
        if event.entity_version != expected {
            error!(
                "Stream {} is not contiguous: expected version {}, found {}",
                entity_id, expected, event.entity_version
            );
            return Err(EventSourcingError::Integrity {
                entity_id: entity_id.to_string(),
                expected,
                found: event.entity_version,
            });
        }
        expected = match order {
            Order::Ascending => expected.wrapping_add(1),
            Order::Descending => expected.wrapping_sub(1),
        };
    }
    Ok(())
}
