// Chronicle - An event-sourcing core for Rust
//
// Entities are rebuilt from append-only event streams; commands publish
// events on a synchronous bus that persists them before returning.

pub mod application;
pub mod config;
pub mod example;

pub use application::Application;
pub use config::{ApplicationConfig, ConfigError};

// Re-export the event and event-sourcing crates
pub use chronicle_events;
pub use chronicle_eventsourcing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{Application, ApplicationConfig};
    pub use chronicle_events::{
        DomainEvent, EventBus, EventBusConfig, EventHandler, EventHeader, RegistryError,
        SubscriptionId, TopicRegistry, handler_fn,
    };
    pub use chronicle_eventsourcing::{
        Entity, EntityBus, EntityRepository, EntityState, EventPlayer, EventSourcingError,
        EventStore, EventStoreConfig, InMemoryStoredEventRepository, Order, PersistenceSubscriber,
        Projection, RepositoryError, Result, StoredEvent, StoredEventRepository, StreamQuery,
    };
}
