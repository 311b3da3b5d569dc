//! Persistence subscriber: writes every published event to the store

use crate::entity::EntityBus;
use crate::error::{EventSourcingError, Result};
use crate::event_store::EventStore;
use crate::store::StoredEventRepository;
use async_trait::async_trait;
use chronicle_events::{DomainEvent, EventHandler, SubscriptionId};
use std::sync::Arc;
use tracing::debug;

/// Bus handler that appends each event before the publish call returns
struct PersistHandler<E, R: ?Sized> {
    store: Arc<EventStore<E, R>>,
}

#[async_trait]
impl<E, R> EventHandler<E, EventSourcingError> for PersistHandler<E, R>
where
    E: DomainEvent,
    R: StoredEventRepository + ?Sized + 'static,
{
    async fn handle(&self, event: &E) -> Result<()> {
        self.store.append(event).await.map(|_| ())
    }
}

/// Persistence subscriber
///
/// Attaching subscribes the store to a bus; from then on a command's publish
/// only succeeds once its event is durably appended, and an append failure
/// (including a concurrency conflict) is returned to the command. Closing or
/// dropping the subscriber detaches it.
pub struct PersistenceSubscriber<E: DomainEvent> {
    bus: EntityBus<E>,
    subscription: Option<SubscriptionId>,
}

impl<E: DomainEvent> PersistenceSubscriber<E> {
    /// Persist every event published on `bus`
    pub fn attach<R>(bus: &EntityBus<E>, store: Arc<EventStore<E, R>>) -> Self
    where
        R: StoredEventRepository + ?Sized + 'static,
    {
        let id = bus.subscribe(PersistHandler { store });
        debug!("Persistence subscriber {} attached", id);
        Self {
            bus: bus.clone(),
            subscription: Some(id),
        }
    }

    /// Persist only the events accepted by `predicate`
    pub fn attach_when<R, P>(
        bus: &EntityBus<E>,
        store: Arc<EventStore<E, R>>,
        predicate: P,
    ) -> Self
    where
        R: StoredEventRepository + ?Sized + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let id = bus.subscribe_when(predicate, PersistHandler { store });
        debug!("Persistence subscriber {} attached with filter", id);
        Self {
            bus: bus.clone(),
            subscription: Some(id),
        }
    }

    /// Check if still subscribed
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some_and(|id| self.bus.is_subscribed(id))
    }

    /// Stop persisting; later publishes are no longer written
    pub fn close(&mut self) {
        if let Some(id) = self.subscription.take()
            && self.bus.unsubscribe(id)
        {
            debug!("Persistence subscriber {} closed", id);
        }
    }
}

impl<E: DomainEvent> Drop for PersistenceSubscriber<E> {
    fn drop(&mut self) {
        self.close();
    }
}
