//! Projections for read models

use crate::error::{EventSourcingError, Result};
use crate::event_store::EventStore;
use crate::store::StoredEventRepository;
use async_trait::async_trait;
use chronicle_events::{DomainEvent, EventHandler};
use std::sync::Arc;
use tracing::{debug, info};

/// Projection trait
///
/// Projections build read models from events. They may be fed live through
/// a bus with [`ProjectionHandler`] or rebuilt from the global log with
/// [`rebuild_projection`].
#[async_trait]
pub trait Projection<E>: Send + Sync {
    /// Project an event to update the read model
    async fn project(&self, event: &E) -> Result<()>;

    /// Drop the read model before a rebuild
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Counts reported by [`rebuild_projection`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Stored events read from the log
    pub scanned: usize,

    /// Events handed to the projection
    pub projected: usize,

    /// Events belonging to other event types
    pub skipped: usize,
}

/// Rebuild a projection from the start of the global log
///
/// The log is read in pages of `page_size`, in global sequence order.
/// Events of other registered entity types are skipped; a topic bound to
/// nothing fails the rebuild.
pub async fn rebuild_projection<E, R, P>(
    store: &EventStore<E, R>,
    projection: &P,
    page_size: usize,
) -> Result<RebuildSummary>
where
    E: DomainEvent,
    R: StoredEventRepository + ?Sized,
    P: Projection<E> + ?Sized,
{
    let page_size = page_size.max(1);
    let mut summary = RebuildSummary::default();
    let mut after = None;

    projection.reset().await?;

    loop {
        let page = store
            .repository()
            .get_all_events(after, Some(page_size))
            .await?;

        for stored in &page {
            summary.scanned += 1;
            if store.handles(stored)? {
                projection.project(&store.decode(stored)?).await?;
                summary.projected += 1;
            } else {
                summary.skipped += 1;
            }
        }

        if page.len() < page_size {
            break;
        }
        after = match page.last().and_then(|s| s.global_sequence) {
            Some(sequence) => Some(sequence),
            None => {
                return Err(EventSourcingError::Storage(
                    "global log returned an unsequenced event".to_string(),
                ));
            }
        };
        debug!("Rebuild read up to sequence {:?}", after);
    }

    info!(
        "Rebuilt projection: {} projected, {} skipped",
        summary.projected, summary.skipped
    );
    Ok(summary)
}

/// Event handler wrapper for projections
pub struct ProjectionHandler<P: ?Sized> {
    projection: Arc<P>,
}

impl<P: ?Sized> ProjectionHandler<P> {
    pub fn new(projection: Arc<P>) -> Self {
        Self { projection }
    }
}

impl<P: ?Sized> Clone for ProjectionHandler<P> {
    fn clone(&self) -> Self {
        Self {
            projection: self.projection.clone(),
        }
    }
}

#[async_trait]
impl<E, P> EventHandler<E, EventSourcingError> for ProjectionHandler<P>
where
    E: DomainEvent,
    P: Projection<E> + ?Sized + 'static,
{
    async fn handle(&self, event: &E) -> Result<()> {
        self.projection.project(event).await
    }
}
