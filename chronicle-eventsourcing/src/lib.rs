//! Event Sourcing for Chronicle
//!
//! This crate stores domain events and rebuilds entities from them.
//!
//! ## Features
//!
//! - **Entities** - State derived only from events, changed only by commands
//! - **Event Store** - Typed append and read over a pluggable repository
//! - **Optimistic Concurrency** - A version can be written once per entity
//! - **Persistence Subscriber** - Publishing an event persists it
//! - **Replay** - Whole or paged reconstruction of an entity
//! - **Projections** - Read models rebuilt from the global log
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chronicle_events::{DomainEvent, EventHeader, TopicRegistry};
//! use chronicle_eventsourcing::*;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! #[serde(tag = "kind", content = "data")]
//! enum UserEvent {
//!     Registered { header: EventHeader, email: String },
//!     Deactivated { header: EventHeader },
//! }
//!
//! // impl DomainEvent for UserEvent { ... }
//!
//! #[derive(Debug, Clone)]
//! struct User {
//!     id: String,
//!     version: u64,
//!     email: String,
//! }
//!
//! impl Entity for User {
//!     type Event = UserEvent;
//!
//!     fn id(&self) -> &str { &self.id }
//!     fn version(&self) -> u64 { self.version }
//!
//!     fn reduce(state: EntityState<Self>, event: &UserEvent) -> Result<EntityState<Self>> {
//!         match (state, event) {
//!             (EntityState::Absent, UserEvent::Registered { header, email }) => {
//!                 Ok(EntityState::Live(User {
//!                     id: header.entity_id.clone(),
//!                     version: header.entity_version,
//!                     email: email.clone(),
//!                 }))
//!             }
//!             (EntityState::Live(_), UserEvent::Deactivated { .. }) => {
//!                 Ok(EntityState::discarded_by(event))
//!             }
//!             (state, event) => Err(state.invalid_transition(event)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut registry = TopicRegistry::new();
//!     registry.register_event::<UserEvent>("accounts")?;
//!
//!     let repository = Arc::new(InMemoryStoredEventRepository::new());
//!     let store = Arc::new(EventStore::new(repository, Arc::new(registry))?);
//!
//!     let bus = EntityBus::new();
//!     let _persistence = PersistenceSubscriber::attach(&bus, store.clone());
//!
//!     let event = UserEvent::Registered {
//!         header: EventHeader::first("user-123"),
//!         email: "alice@example.com".to_string(),
//!     };
//!     User::create(&bus, event).await?;
//!
//!     let users = EntityRepository::<User, _>::new(store);
//!     println!("Loaded user: {:?}", users.get("user-123").await?);
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod entity;
pub mod error;
pub mod event_store;
pub mod mutator;
pub mod persistence;
pub mod player;
pub mod projection;
pub mod reader;
pub mod repository;
pub mod store;
pub mod stored;

#[cfg(test)]
mod testing;

pub use codec::EventCodec;
pub use entity::{Entity, EntityBus};
pub use error::{EventSourcingError, Result};
pub use event_store::{EventStore, EventStoreConfig};
pub use mutator::{EntityState, fold, mutate};
pub use persistence::PersistenceSubscriber;
pub use player::EventPlayer;
pub use projection::{Projection, ProjectionHandler, RebuildSummary, rebuild_projection};
pub use reader::StreamReader;
pub use repository::EntityRepository;
pub use store::{InMemoryStoredEventRepository, RepositoryError, StoredEventRepository};
pub use stored::{Order, StoredEvent, StreamQuery};
