//! Error taxonomy for event sourcing

use crate::store::RepositoryError;
use chronicle_events::{EventHandlerError, RegistryError};

/// Result type for event sourcing operations
pub type Result<T> = std::result::Result<T, EventSourcingError>;

/// Event sourcing error
///
/// Every failure of a command's persistence path surfaces as one of these, so
/// the caller can always tell whether its event was durably recorded.
#[derive(Debug, thiserror::Error)]
pub enum EventSourcingError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error for topic {topic}: {reason}")]
    Deserialization { topic: String, reason: String },

    #[error("Optimistic concurrency conflict: {entity_id} already has an event at version {version}")]
    OptimisticConcurrency { entity_id: String, version: u64 },

    #[error("Integrity error in stream {entity_id}: expected version {expected}, found {found}")]
    Integrity {
        entity_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Version mismatch for {entity_id}: expected {expected}, got {actual}")]
    VersionMismatch {
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Cannot apply {kind} to {state} entity {entity_id}")]
    InvalidTransition {
        entity_id: String,
        kind: &'static str,
        state: &'static str,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Subscriber failed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EventSourcingError {
    /// Whether another writer got to the same entity version first
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventSourcingError::OptimisticConcurrency { .. })
    }

    /// Whether the error means the entity does not exist or was discarded
    pub fn is_entity_not_found(&self) -> bool {
        matches!(self, EventSourcingError::EntityNotFound(_))
    }

    /// Wrap the failure of a subscriber that has its own error type
    pub fn subscriber<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EventSourcingError::Subscriber(Box::new(err))
    }
}

impl From<RepositoryError> for EventSourcingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConcurrencyConflict { entity_id, version } => {
                EventSourcingError::OptimisticConcurrency { entity_id, version }
            }
            RepositoryError::NotFound(what) => EventSourcingError::EventNotFound(what),
            RepositoryError::Storage(msg) => EventSourcingError::Storage(msg),
        }
    }
}

impl From<EventHandlerError> for EventSourcingError {
    fn from(err: EventHandlerError) -> Self {
        EventSourcingError::subscriber(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_optimistic_concurrency() {
        let err: EventSourcingError = RepositoryError::ConcurrencyConflict {
            entity_id: "e-1".to_string(),
            version: 3,
        }
        .into();

        assert!(err.is_concurrency_conflict());
        assert_eq!(
            err.to_string(),
            "Optimistic concurrency conflict: e-1 already has an event at version 3"
        );
    }

    #[test]
    fn test_subscriber_error_keeps_source() {
        let err: EventSourcingError =
            EventHandlerError::HandlerFailed("broker down".to_string()).into();

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Handler failed: broker down");
    }
}
