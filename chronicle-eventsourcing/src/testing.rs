//! Counter entity shared by the unit tests

use crate::codec::EventCodec;
use crate::entity::Entity;
use crate::error::Result;
use crate::event_store::EventStore;
use crate::mutator::EntityState;
use crate::store::InMemoryStoredEventRepository;
use crate::stored::StoredEvent;
use chronicle_events::{DomainEvent, EventHeader, TopicRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum CounterEvent {
    Started { header: EventHeader, start: i64 },
    Incremented { header: EventHeader, by: i64 },
    Stopped { header: EventHeader },
}

impl DomainEvent for CounterEvent {
    fn entity_type() -> &'static str {
        "Counter"
    }

    fn kinds() -> &'static [&'static str] {
        &["Started", "Incremented", "Stopped"]
    }

    fn kind(&self) -> &'static str {
        match self {
            CounterEvent::Started { .. } => "Started",
            CounterEvent::Incremented { .. } => "Incremented",
            CounterEvent::Stopped { .. } => "Stopped",
        }
    }

    fn header(&self) -> &EventHeader {
        match self {
            CounterEvent::Started { header, .. }
            | CounterEvent::Incremented { header, .. }
            | CounterEvent::Stopped { header } => header,
        }
    }
}

/// Second entity type sharing the counter's registry and log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum GaugeEvent {
    Set { header: EventHeader, level: i64 },
}

impl DomainEvent for GaugeEvent {
    fn entity_type() -> &'static str {
        "Gauge"
    }

    fn kinds() -> &'static [&'static str] {
        &["Set"]
    }

    fn kind(&self) -> &'static str {
        "Set"
    }

    fn header(&self) -> &EventHeader {
        match self {
            GaugeEvent::Set { header, .. } => header,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub id: String,
    pub version: u64,
    pub value: i64,
}

impl Entity for Counter {
    type Event = CounterEvent;

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn reduce(state: EntityState<Self>, event: &CounterEvent) -> Result<EntityState<Self>> {
        match (state, event) {
            (EntityState::Absent, CounterEvent::Started { header, start }) => {
                Ok(EntityState::Live(Counter {
                    id: header.entity_id.clone(),
                    version: header.entity_version,
                    value: *start,
                }))
            }
            (EntityState::Live(mut counter), CounterEvent::Incremented { header, by }) => {
                counter.value += by;
                counter.version = header.entity_version;
                Ok(EntityState::Live(counter))
            }
            (EntityState::Live(_), CounterEvent::Stopped { .. }) => {
                Ok(EntityState::discarded_by(event))
            }
            (state, event) => Err(state.invalid_transition(event)),
        }
    }
}

pub fn started(id: &str, start: i64) -> CounterEvent {
    CounterEvent::Started {
        header: EventHeader::first(id),
        start,
    }
}

pub fn incremented(id: &str, version: u64, by: i64) -> CounterEvent {
    CounterEvent::Incremented {
        header: EventHeader::new(id, version),
        by,
    }
}

pub fn stopped(id: &str, version: u64) -> CounterEvent {
    CounterEvent::Stopped {
        header: EventHeader::new(id, version),
    }
}

pub fn registry() -> Arc<TopicRegistry> {
    let mut registry = TopicRegistry::new();
    registry
        .register_event::<CounterEvent>("tests")
        .expect("counter topics register");
    registry
        .register_event::<GaugeEvent>("tests")
        .expect("gauge topics register");
    Arc::new(registry)
}

/// Stored gauge event, foreign to every counter store
pub fn gauge_set(id: &str, level: i64) -> StoredEvent {
    EventCodec::<GaugeEvent>::new(registry())
        .serialize(&GaugeEvent::Set {
            header: EventHeader::first(id),
            level,
        })
        .expect("gauge event serializes")
}

pub fn store() -> (
    Arc<InMemoryStoredEventRepository>,
    Arc<EventStore<CounterEvent, InMemoryStoredEventRepository>>,
) {
    let repository = Arc::new(InMemoryStoredEventRepository::new());
    let store = EventStore::new(repository.clone(), registry()).expect("store builds");
    (repository, Arc::new(store))
}
