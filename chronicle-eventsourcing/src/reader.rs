//! Paged reads of one entity's stream

use crate::error::{EventSourcingError, Result};
use crate::event_store::{EventStore, check_contiguous};
use crate::store::StoredEventRepository;
use crate::stored::{Order, StreamQuery};
use chronicle_events::DomainEvent;
use futures::stream::{self, Stream};

/// Reader that walks a stream page by page
///
/// Each page is one repository query bounded by the last version seen, so a
/// long stream never has to be held in memory at once. Versions must stay
/// contiguous across page boundaries.
pub struct StreamReader<'a, E, R: ?Sized> {
    store: &'a EventStore<E, R>,
    entity_id: &'a str,
    page_size: usize,
    order: Order,
    limit: Option<usize>,
    last_version: Option<u64>,
    done: bool,
    page_count: usize,
    query_count: usize,
    item_count: usize,
}

impl<'a, E, R> StreamReader<'a, E, R>
where
    E: DomainEvent,
    R: StoredEventRepository + ?Sized,
{
    pub(crate) fn new(store: &'a EventStore<E, R>, entity_id: &'a str, page_size: usize) -> Self {
        Self {
            store,
            entity_id,
            page_size: page_size.max(1),
            order: Order::Ascending,
            limit: None,
            last_version: None,
            done: false,
            page_count: 0,
            query_count: 0,
            item_count: 0,
        }
    }

    /// Stop after `limit` events
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Walk the stream newest first
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Pages that returned at least one event
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Repository queries issued
    pub fn query_count(&self) -> usize {
        self.query_count
    }

    /// Events returned so far
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    fn remaining(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.item_count))
    }

    /// Fetch the next page, `None` once the stream is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<E>>> {
        let fetch = self.page_size.min(self.remaining());
        if self.done || fetch == 0 {
            self.done = true;
            return Ok(None);
        }

        let mut query = StreamQuery::all()
            .limit(fetch)
            .query_order(self.order)
            .result_order(self.order);
        query = match (self.order, self.last_version) {
            (Order::Ascending, Some(last)) => query.gt(last),
            (Order::Descending, Some(last)) => query.lt(last),
            (_, None) => query,
        };

        let stored = self
            .store
            .repository()
            .get_entity_events(self.entity_id, &query)
            .await?;
        self.query_count += 1;

        let Some(head) = stored.first() else {
            self.done = true;
            return Ok(None);
        };

        let first = match (self.order, self.last_version) {
            (Order::Ascending, Some(last)) => last.saturating_add(1),
            (Order::Ascending, None) => 0,
            (Order::Descending, Some(last)) => last.wrapping_sub(1),
            (Order::Descending, None) => head.entity_version,
        };
        check_contiguous(self.entity_id, &stored, first, self.order)?;

        let events = stored
            .iter()
            .map(|s| self.store.decode(s))
            .collect::<Result<Vec<E>>>()?;

        self.page_count += 1;
        self.item_count += events.len();
        self.last_version = stored.last().map(|s| s.entity_version);

        let exhausted = stored.len() < fetch
            || self.remaining() == 0
            || (self.order == Order::Descending && self.last_version == Some(0))
            || (self.order == Order::Ascending && self.last_version == Some(u64::MAX));
        if exhausted {
            self.done = true;
        }

        Ok(Some(events))
    }

    /// Read every remaining page into one vector
    pub async fn collect_all(&mut self) -> Result<Vec<E>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }

    /// Turn the reader into a stream of pages
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<E>>> + 'a {
        stream::try_unfold(self, |mut reader| async move {
            let page = reader.next_page().await?;
            Ok::<_, EventSourcingError>(page.map(|page| (page, reader)))
        })
    }
}
