//! Event-sourced entities

use crate::error::{EventSourcingError, Result};
use crate::mutator::{EntityState, mutate};
use async_trait::async_trait;
use chronicle_events::{DomainEvent, EventBus};
use std::fmt::Debug;

/// Bus carrying one entity type's events, failing with [`EventSourcingError`]
pub type EntityBus<E> = EventBus<E, EventSourcingError>;

/// Entity trait
///
/// An entity is never constructed directly: it only comes into being by
/// reducing its events. `reduce` is the entity's mutator. It must be pure and
/// must handle every (state, kind) pair, returning
/// [`EntityState::invalid_transition`] for pairs that make no sense.
///
/// Commands follow one discipline: build the next event, apply it locally,
/// then publish it. Applying first guarantees that no subscriber observes an
/// event the entity does not reflect yet. If publishing fails the local copy
/// is ahead of the store and must be thrown away.
#[async_trait]
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Event enum of this entity type
    type Event: DomainEvent;

    /// Get entity ID
    fn id(&self) -> &str;

    /// Version of the last applied event
    fn version(&self) -> u64;

    /// Fold one event into the state
    fn reduce(state: EntityState<Self>, event: &Self::Event) -> Result<EntityState<Self>>;

    /// Get entity type name
    fn entity_type() -> &'static str {
        <Self::Event as DomainEvent>::entity_type()
    }

    /// Version the next event must carry
    fn next_version(&self) -> u64 {
        self.version() + 1
    }

    /// Apply an event to the in-memory state
    ///
    /// Fails with [`EventSourcingError::VersionMismatch`] unless the event
    /// directly follows the current version. No I/O happens here.
    fn apply(&mut self, event: &Self::Event) -> Result<()> {
        let state = EntityState::Live(self.clone());
        match mutate(state, event)? {
            EntityState::Live(next) => {
                *self = next;
                Ok(())
            }
            other => Err(EventSourcingError::InvalidTransition {
                entity_id: self.id().to_string(),
                kind: event.kind(),
                state: other.label(),
            }),
        }
    }

    /// Create an entity from its first event, then publish the event
    async fn create(bus: &EntityBus<Self::Event>, event: Self::Event) -> Result<Self> {
        let state = mutate(EntityState::Absent, &event)?;
        let Some(entity) = state.into_live() else {
            return Err(EventSourcingError::InvalidTransition {
                entity_id: event.entity_id().to_string(),
                kind: event.kind(),
                state: "absent",
            });
        };

        bus.publish(&event).await?;
        Ok(entity)
    }

    /// Apply an event locally, then publish it
    async fn trigger(&mut self, bus: &EntityBus<Self::Event>, event: Self::Event) -> Result<()> {
        self.apply(&event)?;
        bus.publish(&event).await
    }

    /// Apply a terminal event, then publish it
    ///
    /// Consumes the entity: once discarded it can no longer issue commands.
    async fn discard_with(self, bus: &EntityBus<Self::Event>, event: Self::Event) -> Result<()> {
        let entity_id = self.id().to_string();
        let state = mutate(EntityState::Live(self), &event)?;
        if !state.is_discarded() {
            return Err(EventSourcingError::InvalidTransition {
                entity_id,
                kind: event.kind(),
                state: "live",
            });
        }

        bus.publish(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Counter, CounterEvent, incremented, started, stopped};
    use chronicle_events::handler_fn;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_bus() -> (EntityBus<CounterEvent>, Arc<Mutex<Vec<CounterEvent>>>) {
        let bus = EntityBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(handler_fn(move |e: &CounterEvent| {
            sink.lock().push(e.clone());
            Ok(())
        }));
        (bus, seen)
    }

    #[tokio::test]
    async fn test_create_applies_and_publishes() {
        let (bus, seen) = recording_bus();

        let counter = Counter::create(&bus, started("c-1", 5)).await.unwrap();

        assert_eq!(counter.value, 5);
        assert_eq!(counter.version(), 0);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_first_version() {
        let (bus, seen) = recording_bus();
        let event = CounterEvent::Started {
            header: chronicle_events::EventHeader::new("c-1", 3),
            start: 0,
        };

        let err = Counter::create(&bus, event).await.unwrap_err();
        assert!(matches!(err, EventSourcingError::VersionMismatch { expected: 0, actual: 3, .. }));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_trigger() {
        let (bus, seen) = recording_bus();
        let mut counter = Counter::create(&bus, started("c-1", 0)).await.unwrap();

        counter.trigger(&bus, incremented("c-1", 1, 3)).await.unwrap();
        assert_eq!(counter.value, 3);
        assert_eq!(counter.version(), 1);
        assert_eq!(counter.next_version(), 2);
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_apply_rejects_out_of_order_event() {
        let mut counter = Counter {
            id: "c-1".to_string(),
            version: 0,
            value: 0,
        };

        let err = counter.apply(&incremented("c-1", 2, 1)).unwrap_err();
        assert!(matches!(
            err,
            EventSourcingError::VersionMismatch { expected: 1, actual: 2, .. }
        ));
        assert_eq!(counter.version, 0);
    }

    #[test]
    fn test_apply_rejects_terminal_event() {
        let mut counter = Counter {
            id: "c-1".to_string(),
            version: 0,
            value: 0,
        };

        let err = counter.apply(&stopped("c-1", 1)).unwrap_err();
        assert!(matches!(err, EventSourcingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_subscriber_sees_event_after_local_apply() {
        let bus: EntityBus<CounterEvent> = EntityBus::new();
        bus.subscribe(handler_fn(|_: &CounterEvent| {
            Err(EventSourcingError::Storage("offline".to_string()))
        }));
        let mut counter = Counter {
            id: "c-1".to_string(),
            version: 0,
            value: 0,
        };

        let err = counter.trigger(&bus, incremented("c-1", 1, 2)).await.unwrap_err();

        // The failure reaches the command; the local copy already moved on
        assert!(matches!(err, EventSourcingError::Storage(_)));
        assert_eq!(counter.value, 2);
    }

    #[tokio::test]
    async fn test_discard_with() {
        let (bus, seen) = recording_bus();
        let counter = Counter::create(&bus, started("c-1", 0)).await.unwrap();

        counter.discard_with(&bus, stopped("c-1", 1)).await.unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_discard_with_non_terminal_event_fails() {
        let (bus, seen) = recording_bus();
        let counter = Counter::create(&bus, started("c-1", 0)).await.unwrap();

        let err = counter
            .discard_with(&bus, incremented("c-1", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EventSourcingError::InvalidTransition { .. }));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_entity_type() {
        assert_eq!(Counter::entity_type(), "Counter");
    }
}
