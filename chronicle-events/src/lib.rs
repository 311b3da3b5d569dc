//! Domain events for Chronicle
//!
//! This crate defines what a domain event is, how event kinds map to stable
//! topic strings, and how events are published in-process.
//!
//! ## Features
//!
//! - **Domain Events** - Closed, per-entity enums of immutable facts
//! - **Topic Registry** - Stable string identifiers for stored event kinds
//! - **Event Bus** - Synchronous publish/subscribe with error propagation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chronicle_events::*;
//! use serde::{Deserialize, Serialize};
//!
//! // Define the events of one entity type
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! #[serde(tag = "kind", content = "data")]
//! enum AccountEvent {
//!     Opened { header: EventHeader, owner: String },
//!     Closed { header: EventHeader },
//! }
//!
//! impl DomainEvent for AccountEvent {
//!     fn entity_type() -> &'static str { "Account" }
//!     fn kinds() -> &'static [&'static str] { &["Opened", "Closed"] }
//!     fn kind(&self) -> &'static str {
//!         match self {
//!             AccountEvent::Opened { .. } => "Opened",
//!             AccountEvent::Closed { .. } => "Closed",
//!         }
//!     }
//!     fn header(&self) -> &EventHeader {
//!         match self {
//!             AccountEvent::Opened { header, .. } | AccountEvent::Closed { header } => header,
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Register topics at startup
//!     let mut registry = TopicRegistry::new();
//!     registry.register_event::<AccountEvent>("bank")?;
//!
//!     // Publish through a bus owned by the application
//!     let bus: EventBus<AccountEvent> = EventBus::new();
//!     bus.subscribe(handler_fn(|event: &AccountEvent| {
//!         println!("{} v{}", event.kind(), event.entity_version());
//!         Ok(())
//!     }));
//!
//!     bus.publish(&AccountEvent::Opened {
//!         header: EventHeader::first("acc-1"),
//!         owner: "alice".to_string(),
//!     }).await?;
//!
//!     bus.clear();
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The bus is generic over the error its handlers return. The first failing
//! handler stops dispatch and its error is returned from `publish` as-is:
//!
//! ```rust,ignore
//! let bus: EventBus<AccountEvent, MyError> = EventBus::new();
//! match bus.publish(&event).await {
//!     Ok(()) => println!("All handlers succeeded"),
//!     Err(e) => eprintln!("Handler failed: {}", e),
//! }
//! ```

pub mod bus;
pub mod event;
pub mod topic;

pub use bus::{EventBus, EventBusBuilder, EventBusConfig, SubscriptionId};
pub use event::{
    DomainEvent, EventHandler, EventHandlerError, EventHeader, HandlerFn, handler_fn,
};
pub use topic::{RegistryError, TopicRegistry};
