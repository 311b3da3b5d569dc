//! Domain event definitions and handler traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Domain event trait
///
/// A domain event is an immutable fact about one state change of one entity.
/// Each entity type declares a single enum of its event kinds and implements
/// this trait for it, so the set of kinds is closed and matched exhaustively.
///
/// The codec stores the kind separately from the payload, which requires the
/// enum to be adjacently tagged:
///
/// ```rust,ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// #[serde(tag = "kind", content = "data")]
/// enum AccountEvent {
///     Opened { header: EventHeader, owner: String },
///     Closed { header: EventHeader },
/// }
/// ```
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Name of the entity type these events belong to
    fn entity_type() -> &'static str;

    /// All kind tags this event type can carry
    fn kinds() -> &'static [&'static str];

    /// Kind tag of this event, identical to its serde variant name
    fn kind(&self) -> &'static str;

    /// Header shared by every kind
    fn header(&self) -> &EventHeader;

    /// ID of the entity this event belongs to
    fn entity_id(&self) -> &str {
        &self.header().entity_id
    }

    /// Zero-based position of this event in the entity's stream
    fn entity_version(&self) -> u64 {
        self.header().entity_version
    }

    /// Time the event was produced
    fn timestamp(&self) -> DateTime<Utc> {
        self.header().timestamp
    }
}

/// Fields carried by every domain event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHeader {
    /// Entity ID
    pub entity_id: String,

    /// Position in the entity's stream, starting at 0
    pub entity_version: u64,

    /// Timestamp when the event was created
    pub timestamp: DateTime<Utc>,
}

impl EventHeader {
    /// Create a header stamped with the current time
    pub fn new(entity_id: impl Into<String>, entity_version: u64) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_version,
            timestamp: Utc::now(),
        }
    }

    /// Header for the first event of a new entity
    pub fn first(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, 0)
    }

    /// Header for the event that follows this one in the same stream
    pub fn following(&self) -> Self {
        Self::new(self.entity_id.clone(), self.entity_version + 1)
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Event handler trait
///
/// `Err` is the error type shared by every handler on one bus. A handler's
/// error is returned to the publisher as-is.
#[async_trait]
pub trait EventHandler<E, Err = EventHandlerError>: Send + Sync {
    /// Handle the event
    async fn handle(&self, event: &E) -> Result<(), Err>;
}

/// Event handler error
#[derive(Debug, thiserror::Error)]
pub enum EventHandlerError {
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Event processing error: {0}")]
    ProcessingError(String),
}

/// Handler backed by a plain closure
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a synchronous closure as an [`EventHandler`]
pub fn handler_fn<E, Err, F>(f: F) -> HandlerFn<F>
where
    F: Fn(&E) -> Result<(), Err> + Send + Sync,
{
    HandlerFn { f }
}

#[async_trait]
impl<E, Err, F> EventHandler<E, Err> for HandlerFn<F>
where
    E: Send + Sync + 'static,
    Err: Send + 'static,
    F: Fn(&E) -> Result<(), Err> + Send + Sync,
{
    async fn handle(&self, event: &E) -> Result<(), Err> {
        (self.f)(event)
    }
}
