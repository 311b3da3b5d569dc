//! Entity repository

use crate::entity::Entity;
use crate::error::{EventSourcingError, Result};
use crate::event_store::EventStore;
use crate::player::EventPlayer;
use crate::store::StoredEventRepository;
use std::sync::Arc;

/// Entity repository
///
/// Read-only lookup of entities by ID. Writing goes through the entity's own
/// commands and the bus; the repository never saves anything.
pub struct EntityRepository<T: Entity, R: ?Sized> {
    player: EventPlayer<T, R>,
}

impl<T, R> EntityRepository<T, R>
where
    T: Entity,
    R: StoredEventRepository + ?Sized,
{
    /// Create new repository
    pub fn new(store: Arc<EventStore<T::Event, R>>) -> Self {
        Self {
            player: EventPlayer::new(store),
        }
    }

    /// Get entity by ID
    ///
    /// Fails with [`EventSourcingError::EntityNotFound`] if the entity has no
    /// events or has been discarded.
    pub async fn get(&self, entity_id: &str) -> Result<T> {
        self.player.replay(entity_id).await
    }

    /// Get entity by ID, `None` if it does not exist
    pub async fn find(&self, entity_id: &str) -> Result<Option<T>> {
        match self.player.replay(entity_id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(EventSourcingError::EntityNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Check if a live entity exists
    pub async fn contains(&self, entity_id: &str) -> Result<bool> {
        Ok(self.find(entity_id).await?.is_some())
    }

    /// Event store backing this repository
    pub fn store(&self) -> &Arc<EventStore<T::Event, R>> {
        self.player.store()
    }
}

impl<T: Entity, R: ?Sized> Clone for EntityRepository<T, R> {
    fn clone(&self) -> Self {
        Self {
            player: self.player.clone(),
        }
    }
}
