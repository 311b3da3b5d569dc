//! Hosting application

use crate::config::ApplicationConfig;
use chronicle_events::{EventBus, TopicRegistry};
use chronicle_eventsourcing::{
    Entity, EntityBus, EntityRepository, EventStore, InMemoryStoredEventRepository,
    PersistenceSubscriber, Result, StoredEventRepository,
};
use std::sync::Arc;
use tracing::info;

/// Application owning the event-sourcing collaborators of one entity type
///
/// Construction wires the bus, the event store, the persistence subscriber and
/// the repository facade together; [`Application::close`] (or dropping the
/// application) detaches persistence from the bus. Nothing is global: two
/// applications in one process never share a bus.
pub struct Application<T: Entity, R: ?Sized> {
    bus: EntityBus<T::Event>,
    store: Arc<EventStore<T::Event, R>>,
    persistence: PersistenceSubscriber<T::Event>,
    repository: EntityRepository<T, R>,
}

impl<T, R> Application<T, R>
where
    T: Entity,
    R: StoredEventRepository + ?Sized + 'static,
{
    /// Create application over a repository backend
    pub fn new(
        repository: Arc<R>,
        registry: Arc<TopicRegistry>,
        config: ApplicationConfig,
    ) -> Result<Self> {
        let store = Arc::new(EventStore::with_config(repository, registry, config.store)?);
        let bus = EventBus::with_config(config.bus);
        let persistence = PersistenceSubscriber::attach(&bus, store.clone());
        let repository = EntityRepository::new(store.clone());

        info!("Application for {} started", T::entity_type());
        Ok(Self {
            bus,
            store,
            persistence,
            repository,
        })
    }

    /// Bus commands publish on
    pub fn bus(&self) -> &EntityBus<T::Event> {
        &self.bus
    }

    /// Event store
    pub fn store(&self) -> &Arc<EventStore<T::Event, R>> {
        &self.store
    }

    /// Repository facade
    pub fn repository(&self) -> &EntityRepository<T, R> {
        &self.repository
    }

    /// Get entity by ID
    pub async fn get(&self, entity_id: &str) -> Result<T> {
        self.repository.get(entity_id).await
    }

    /// Check if published events are still persisted
    pub fn is_running(&self) -> bool {
        self.persistence.is_attached()
    }

    /// Detach persistence and drop every other subscription
    pub fn close(&mut self) {
        self.persistence.close();
        self.bus.clear();
        info!("Application for {} closed", T::entity_type());
    }
}

impl<T: Entity> Application<T, InMemoryStoredEventRepository> {
    /// Create application over a fresh in-memory backend
    pub fn in_memory(registry: Arc<TopicRegistry>, config: ApplicationConfig) -> Result<Self> {
        Self::new(Arc::new(InMemoryStoredEventRepository::new()), registry, config)
    }
}
