//! Reduction of event sequences into entity state

use crate::entity::Entity;
use crate::error::{EventSourcingError, Result};
use chronicle_events::DomainEvent;

/// State threaded through a reduction
///
/// `Discarded` is terminal: no event can follow it, and lookups treat it the
/// same as an entity that never existed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EntityState<T> {
    #[default]
    Absent,
    Live(T),
    Discarded { entity_id: String, version: u64 },
}

impl<T: Entity> EntityState<T> {
    /// Terminal state reached through `event`
    pub fn discarded_by<E: DomainEvent>(event: &E) -> Self {
        EntityState::Discarded {
            entity_id: event.entity_id().to_string(),
            version: event.entity_version(),
        }
    }

    /// Version the next event must carry, `None` once discarded
    pub fn next_version(&self) -> Option<u64> {
        match self {
            EntityState::Absent => Some(0),
            EntityState::Live(entity) => Some(entity.version() + 1),
            EntityState::Discarded { .. } => None,
        }
    }

    /// Short name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityState::Absent => "absent",
            EntityState::Live(_) => "live",
            EntityState::Discarded { .. } => "discarded",
        }
    }

    /// Live entity, if any
    pub fn into_live(self) -> Option<T> {
        match self {
            EntityState::Live(entity) => Some(entity),
            _ => None,
        }
    }

    /// Check for the terminal marker
    pub fn is_discarded(&self) -> bool {
        matches!(self, EntityState::Discarded { .. })
    }

    /// Error for a reducer arm that has no transition for `event`
    pub fn invalid_transition(&self, event: &T::Event) -> EventSourcingError {
        EventSourcingError::InvalidTransition {
            entity_id: event.entity_id().to_string(),
            kind: event.kind(),
            state: self.label(),
        }
    }
}

/// Apply one event: check its position, then run the entity's reducer
pub fn mutate<T: Entity>(state: EntityState<T>, event: &T::Event) -> Result<EntityState<T>> {
    let Some(expected) = state.next_version() else {
        return Err(state.invalid_transition(event));
    };

    if event.entity_version() != expected {
        return Err(EventSourcingError::VersionMismatch {
            entity_id: event.entity_id().to_string(),
            expected,
            actual: event.entity_version(),
        });
    }

    T::reduce(state, event)
}

/// Fold an ordered event sequence from the absent state
pub fn fold<'a, T, I>(events: I) -> Result<EntityState<T>>
where
    T: Entity,
    I: IntoIterator<Item = &'a T::Event>,
{
    events
        .into_iter()
        .try_fold(EntityState::Absent, |state, event| mutate(state, event))
}
