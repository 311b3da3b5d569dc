//! Topic registry
//!
//! A topic is the stable string under which one event kind is stored. Stored
//! data only ever refers to topics, so renaming a variant or moving a type does
//! not orphan historical events as long as the topic binding is kept.
//!
//! The registry is populated once at startup and shared read-only afterwards.

use crate::event::DomainEvent;
use std::collections::HashMap;
use tracing::debug;

/// Registry key: entity type plus kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KindKey {
    entity_type: &'static str,
    kind: &'static str,
}

/// Bidirectional mapping between event kinds and topics
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: HashMap<KindKey, String>,
    kinds: HashMap<String, KindKey>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind one kind of `E` to a topic
    ///
    /// Re-registering the same binding is a no-op. Binding a topic that is
    /// already taken, or a kind that already has a different topic, fails.
    pub fn register<E: DomainEvent>(
        &mut self,
        kind: &str,
        topic: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let topic = topic.into();
        let key = Self::key_of::<E>(kind)?;

        if let Some(existing) = self.kinds.get(&topic) {
            if *existing == key {
                return Ok(());
            }
            return Err(RegistryError::DuplicateTopic {
                topic,
                existing: format!("{}.{}", existing.entity_type, existing.kind),
            });
        }

        if let Some(existing) = self.topics.get(&key) {
            return Err(RegistryError::KindAlreadyRegistered {
                kind: format!("{}.{}", key.entity_type, key.kind),
                existing: existing.clone(),
            });
        }

        debug!(
            "Registered topic {} for {}.{}",
            topic, key.entity_type, key.kind
        );
        self.topics.insert(key, topic.clone());
        self.kinds.insert(topic, key);
        Ok(())
    }

    /// Bind every kind of `E` to `"{namespace}#{EntityType}.{Kind}"`
    pub fn register_event<E: DomainEvent>(&mut self, namespace: &str) -> Result<(), RegistryError> {
        for kind in E::kinds() {
            let topic = format!("{}#{}.{}", namespace, E::entity_type(), kind);
            self.register::<E>(kind, topic)?;
        }
        Ok(())
    }

    /// Topic bound to a kind of `E`
    pub fn resolve_topic<E: DomainEvent>(&self, kind: &str) -> Result<&str, RegistryError> {
        let key = Self::key_of::<E>(kind)?;
        self.topics
            .get(&key)
            .map(String::as_str)
            .ok_or(RegistryError::UnregisteredKind {
                entity_type: key.entity_type,
                kind: key.kind,
            })
    }

    /// Kind of `E` bound to a topic
    ///
    /// This is the only point where stored data with an unrecognized
    /// structure is rejected before decoding.
    pub fn resolve_kind<E: DomainEvent>(&self, topic: &str) -> Result<&'static str, RegistryError> {
        let key = self
            .kinds
            .get(topic)
            .ok_or_else(|| RegistryError::UnknownTopic(topic.to_string()))?;

        if key.entity_type != E::entity_type() {
            return Err(RegistryError::ForeignTopic {
                topic: topic.to_string(),
                expected: E::entity_type(),
                found: key.entity_type,
            });
        }
        Ok(key.kind)
    }

    /// Whether a topic resolves to a kind of `E`
    pub fn resolves<E: DomainEvent>(&self, topic: &str) -> bool {
        self.kinds
            .get(topic)
            .is_some_and(|key| key.entity_type == E::entity_type())
    }

    /// Check that every kind of `E` has a topic
    pub fn ensure_registered<E: DomainEvent>(&self) -> Result<(), RegistryError> {
        for kind in E::kinds() {
            self.resolve_topic::<E>(kind)?;
        }
        Ok(())
    }

    /// Number of registered topics
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if no topic is registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Iterate over registered topics
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    fn key_of<E: DomainEvent>(kind: &str) -> Result<KindKey, RegistryError> {
        E::kinds()
            .iter()
            .copied()
            .find(|k| *k == kind)
            .map(|k| KindKey {
                entity_type: E::entity_type(),
                kind: k,
            })
            .ok_or_else(|| RegistryError::UnknownKind {
                entity_type: E::entity_type(),
                kind: kind.to_string(),
            })
    }
}

/// Topic registry error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Topic {topic} belongs to {found}, not {expected}")]
    ForeignTopic {
        topic: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{kind} is not a kind of {entity_type}")]
    UnknownKind {
        entity_type: &'static str,
        kind: String,
    },

    #[error("No topic registered for {entity_type}.{kind}")]
    UnregisteredKind {
        entity_type: &'static str,
        kind: &'static str,
    },

    #[error("Topic {topic} is already bound to {existing}")]
    DuplicateTopic { topic: String, existing: String },

    #[error("{kind} is already bound to topic {existing}")]
    KindAlreadyRegistered { kind: String, existing: String },
}

impl RegistryError {
    /// Whether this error came from resolving a stored topic
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownTopic(_) | RegistryError::ForeignTopic { .. }
        )
    }
}
