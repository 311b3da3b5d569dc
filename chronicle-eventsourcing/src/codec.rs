//! Conversion between domain events and stored events
//!
//! The kind tag is not kept in the payload: it is replaced by the registered
//! topic, so the payload only has to stay compatible with the variant's fields.

use crate::error::{EventSourcingError, Result};
use crate::stored::StoredEvent;
use chronicle_events::{DomainEvent, RegistryError, TopicRegistry};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Serde tag field of a domain event enum
pub const KIND_FIELD: &str = "kind";

/// Serde content field of a domain event enum
pub const DATA_FIELD: &str = "data";

/// Codec for one domain event type
pub struct EventCodec<E> {
    registry: Arc<TopicRegistry>,
    _phantom: PhantomData<fn() -> E>,
}

impl<E: DomainEvent> EventCodec<E> {
    /// Create codec over a populated registry
    pub fn new(registry: Arc<TopicRegistry>) -> Self {
        Self {
            registry,
            _phantom: PhantomData,
        }
    }

    /// Registry used to resolve topics
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Whether a stored event decodes to `E`
    ///
    /// A topic bound to another entity type is `Ok(false)`. A topic bound to
    /// nothing fails with [`RegistryError::UnknownTopic`].
    pub fn handles(&self, stored: &StoredEvent) -> Result<bool> {
        match self.registry.resolve_kind::<E>(&stored.topic) {
            Ok(_) => Ok(true),
            Err(RegistryError::ForeignTopic { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Encode a domain event
    pub fn serialize(&self, event: &E) -> Result<StoredEvent> {
        let kind = event.kind();
        let topic = self.registry.resolve_topic::<E>(kind)?.to_string();

        let value = serde_json::to_value(event)
            .map_err(|e| EventSourcingError::Serialization(format!("{}: {}", kind, e)))?;
        let Value::Object(mut fields) = value else {
            return Err(EventSourcingError::Serialization(format!(
                "{}: expected an adjacently tagged enum",
                kind
            )));
        };

        match fields.remove(KIND_FIELD) {
            Some(Value::String(tag)) if tag == kind => {}
            other => {
                return Err(EventSourcingError::Serialization(format!(
                    "{}: serialized kind tag {:?} does not match",
                    kind, other
                )));
            }
        }

        Ok(StoredEvent {
            event_id: Uuid::new_v4(),
            entity_id: event.entity_id().to_string(),
            entity_version: event.entity_version(),
            topic,
            payload: fields.remove(DATA_FIELD).unwrap_or(Value::Null),
            timestamp: event.timestamp(),
            global_sequence: None,
        })
    }

    /// Decode a stored event
    ///
    /// Fails with a registry error if the topic is unknown, and with a
    /// deserialization error if the payload does not fit the kind or
    /// disagrees with the record's entity ID and version.
    pub fn deserialize(&self, stored: &StoredEvent) -> Result<E> {
        let kind = self.registry.resolve_kind::<E>(&stored.topic)?;

        let mut fields = Map::new();
        fields.insert(KIND_FIELD.to_string(), Value::String(kind.to_string()));
        if !stored.payload.is_null() {
            fields.insert(DATA_FIELD.to_string(), stored.payload.clone());
        }

        let event: E = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            EventSourcingError::Deserialization {
                topic: stored.topic.clone(),
                reason: e.to_string(),
            }
        })?;

        if event.entity_id() != stored.entity_id || event.entity_version() != stored.entity_version
        {
            return Err(EventSourcingError::Deserialization {
                topic: stored.topic.clone(),
                reason: format!(
                    "payload belongs to {}@{}, record is {}@{}",
                    event.entity_id(),
                    event.entity_version(),
                    stored.entity_id,
                    stored.entity_version
                ),
            });
        }

        Ok(event)
    }
}

impl<E> Clone for EventCodec<E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            _phantom: PhantomData,
        }
    }
}
