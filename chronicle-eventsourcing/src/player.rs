//! Replay of stored streams into entities

use crate::entity::Entity;
use crate::error::{EventSourcingError, Result};
use crate::event_store::EventStore;
use crate::mutator::{EntityState, fold, mutate};
use crate::store::StoredEventRepository;
use std::sync::Arc;
use tracing::debug;

/// Event player
///
/// Reconstructs entities by reading their stream and running the mutator
/// over it. Replay is deterministic: the same stream always yields the same
/// state.
pub struct EventPlayer<T: Entity, R: ?Sized> {
    store: Arc<EventStore<T::Event, R>>,
}

impl<T, R> EventPlayer<T, R>
where
    T: Entity,
    R: StoredEventRepository + ?Sized,
{
    /// Create player over an event store
    pub fn new(store: Arc<EventStore<T::Event, R>>) -> Self {
        Self { store }
    }

    /// Event store being replayed
    pub fn store(&self) -> &Arc<EventStore<T::Event, R>> {
        &self.store
    }

    /// Replay a stream into its final state
    ///
    /// Reads page by page when the store is configured with a page size.
    pub async fn replay_state(&self, entity_id: &str) -> Result<EntityState<T>> {
        let state = match self.store.config().page_size {
            Some(page_size) => {
                let mut reader = self.store.reader(entity_id, page_size);
                let mut state = EntityState::Absent;
                while let Some(page) = reader.next_page().await? {
                    for event in &page {
                        state = mutate(state, event)?;
                    }
                }
                debug!(
                    "Replayed {} events of {} in {} pages",
                    reader.item_count(),
                    entity_id,
                    reader.page_count()
                );
                state
            }
            None => {
                let events = self.store.get_domain_events(entity_id, None).await?;
                debug!("Replayed {} events of {}", events.len(), entity_id);
                fold(&events)?
            }
        };
        Ok(state)
    }

    /// Replay a stream into a live entity
    ///
    /// Fails with [`EventSourcingError::EntityNotFound`] when the stream is
    /// empty or ends with a discard.
    pub async fn replay(&self, entity_id: &str) -> Result<T> {
        self.replay_state(entity_id)
            .await?
            .into_live()
            .ok_or_else(|| EventSourcingError::EntityNotFound(entity_id.to_string()))
    }
}

impl<T: Entity, R: ?Sized> Clone for EventPlayer<T, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
