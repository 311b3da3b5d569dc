//! Reference domain model
//!
//! `Example` is a minimal entity with two integer attributes. It shows the
//! command discipline every entity follows: build the next event, apply it,
//! publish it.

use chronicle_events::{DomainEvent, EventHeader, RegistryError, TopicRegistry};
use chronicle_eventsourcing::{Entity, EntityBus, EntityState, Result};
use serde::{Deserialize, Serialize};

/// Namespace of the example topics
pub const NAMESPACE: &str = "example";

/// Attribute changed by [`ExampleEvent::AttributeChanged`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "value", rename_all = "lowercase")]
pub enum ExampleAttribute {
    A(i64),
    B(i64),
}

/// Events of the `Example` entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ExampleEvent {
    Created {
        header: EventHeader,
        a: i64,
        b: i64,
    },
    AttributeChanged {
        header: EventHeader,
        attribute: ExampleAttribute,
    },
    Discarded {
        header: EventHeader,
    },
}

impl DomainEvent for ExampleEvent {
    fn entity_type() -> &'static str {
        "Example"
    }

    fn kinds() -> &'static [&'static str] {
        &["Created", "AttributeChanged", "Discarded"]
    }

    fn kind(&self) -> &'static str {
        match self {
            ExampleEvent::Created { .. } => "Created",
            ExampleEvent::AttributeChanged { .. } => "AttributeChanged",
            ExampleEvent::Discarded { .. } => "Discarded",
        }
    }

    fn header(&self) -> &EventHeader {
        match self {
            ExampleEvent::Created { header, .. }
            | ExampleEvent::AttributeChanged { header, .. }
            | ExampleEvent::Discarded { header } => header,
        }
    }
}

/// Register the example topics
pub fn register(registry: &mut TopicRegistry) -> std::result::Result<(), RegistryError> {
    registry.register_event::<ExampleEvent>(NAMESPACE)
}

/// Example entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    id: String,
    version: u64,
    a: i64,
    b: i64,
}

impl Example {
    pub fn a(&self) -> i64 {
        self.a
    }

    pub fn b(&self) -> i64 {
        self.b
    }

    /// Create a new example and publish its `Created` event
    pub async fn open(
        bus: &EntityBus<ExampleEvent>,
        id: impl Into<String>,
        a: i64,
        b: i64,
    ) -> Result<Self> {
        let event = ExampleEvent::Created {
            header: EventHeader::first(id),
            a,
            b,
        };
        Self::create(bus, event).await
    }

    /// Set attribute `a`
    pub async fn set_a(&mut self, bus: &EntityBus<ExampleEvent>, value: i64) -> Result<()> {
        self.change(bus, ExampleAttribute::A(value)).await
    }

    /// Set attribute `b`
    pub async fn set_b(&mut self, bus: &EntityBus<ExampleEvent>, value: i64) -> Result<()> {
        self.change(bus, ExampleAttribute::B(value)).await
    }

    async fn change(
        &mut self,
        bus: &EntityBus<ExampleEvent>,
        attribute: ExampleAttribute,
    ) -> Result<()> {
        let event = ExampleEvent::AttributeChanged {
            header: EventHeader::new(self.id.clone(), self.next_version()),
            attribute,
        };
        self.trigger(bus, event).await
    }

    /// Discard the example; later lookups fail
    pub async fn discard(self, bus: &EntityBus<ExampleEvent>) -> Result<()> {
        let event = ExampleEvent::Discarded {
            header: EventHeader::new(self.id.clone(), self.next_version()),
        };
        self.discard_with(bus, event).await
    }
}

impl Entity for Example {
    type Event = ExampleEvent;

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn reduce(state: EntityState<Self>, event: &ExampleEvent) -> Result<EntityState<Self>> {
        match (state, event) {
            (EntityState::Absent, ExampleEvent::Created { header, a, b }) => {
                Ok(EntityState::Live(Example {
                    id: header.entity_id.clone(),
                    version: header.entity_version,
                    a: *a,
                    b: *b,
                }))
            }
            (
                EntityState::Live(mut example),
                ExampleEvent::AttributeChanged { header, attribute },
            ) => {
                match attribute {
                    ExampleAttribute::A(value) => example.a = *value,
                    ExampleAttribute::B(value) => example.b = *value,
                }
                example.version = header.entity_version;
                Ok(EntityState::Live(example))
            }
            (EntityState::Live(_), ExampleEvent::Discarded { .. }) => {
                Ok(EntityState::discarded_by(event))
            }
            (state, event) => Err(state.invalid_transition(event)),
        }
    }
}
