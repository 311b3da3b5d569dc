//! Event Bus implementation

use crate::event::{DomainEvent, EventHandler, EventHandlerError};
use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription<E, Err> {
    id: SubscriptionId,
    predicate: Option<Predicate<E>>,
    handler: Arc<dyn EventHandler<E, Err>>,
}

impl<E, Err> Subscription<E, Err> {
    fn matches(&self, event: &E) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(event))
    }
}

/// Synchronous in-process publish/subscribe bus
///
/// Handlers run one after another, in registration order, on the task that
/// calls [`publish`](EventBus::publish). The first handler error stops the
/// dispatch and is returned to the publisher unchanged, so a command that
/// publishes an event fails whenever one of its subscribers fails.
///
/// The bus is a value owned by the hosting application: create it at startup,
/// hand clones to collaborators (clones share one registry) and call
/// [`clear`](EventBus::clear) at shutdown.
pub struct EventBus<E, Err = EventHandlerError> {
    /// Subscriptions in registration order
    subscriptions: Arc<RwLock<Vec<Arc<Subscription<E, Err>>>>>,

    next_id: Arc<AtomicU64>,

    /// Configuration
    config: Arc<EventBusConfig>,
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Enable event logging
    pub enable_logging: bool,

    /// Warn when an event has no matching subscriber
    pub warn_unhandled: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            warn_unhandled: false,
        }
    }
}

impl<E, Err> EventBus<E, Err>
where
    E: DomainEvent,
    Err: Send + 'static,
{
    /// Create new event bus
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create event bus with custom config
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            config: Arc::new(config),
        }
    }

    /// Subscribe a handler to every event
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let bus: EventBus<AccountEvent> = EventBus::new();
    /// let id = bus.subscribe(AuditHandler::new());
    /// ```
    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: EventHandler<E, Err> + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Subscribe a handler to the events accepted by `predicate`
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// bus.subscribe_when(|e: &AccountEvent| e.kind() == "Closed", NotifyHandler);
    /// ```
    pub fn subscribe_when<P, H>(&self, predicate: P, handler: H) -> SubscriptionId
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: EventHandler<E, Err> + 'static,
    {
        self.register(Some(Box::new(predicate)), Arc::new(handler))
    }

    /// Subscribe an already shared handler
    pub fn subscribe_shared(&self, handler: Arc<dyn EventHandler<E, Err>>) -> SubscriptionId {
        self.register(None, handler)
    }

    fn register(
        &self,
        predicate: Option<Predicate<E>>,
        handler: Arc<dyn EventHandler<E, Err>>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Arc::new(Subscription {
            id,
            predicate,
            handler,
        }));

        if self.config.enable_logging {
            debug!("Subscribed handler {}", id);
        }
        id
    }

    /// Remove one subscription
    ///
    /// Returns `false` if the subscription was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;

        if removed && self.config.enable_logging {
            debug!("Unsubscribed handler {}", id);
        }
        removed
    }

    /// Publish an event
    ///
    /// Every subscription registered when the call starts, and whose predicate
    /// accepts the event, is invoked in registration order.
    pub async fn publish(&self, event: &E) -> Result<(), Err> {
        let matching: Vec<_> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.matches(event))
            .cloned()
            .collect();

        if self.config.enable_logging {
            debug!(
                "Publishing {} for {} at version {} to {} handler(s)",
                event.kind(),
                event.entity_id(),
                event.entity_version(),
                matching.len()
            );
        }

        if matching.is_empty() && self.config.warn_unhandled {
            warn!(
                "No handlers registered for {} on {}",
                event.kind(),
                event.entity_id()
            );
        }

        for subscription in matching {
            subscription.handler.handle(event).await?;
        }

        Ok(())
    }

    /// Publish several events in order, stopping at the first failure
    pub async fn publish_all(&self, events: &[E]) -> Result<(), Err> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// Clear all handlers
    pub fn clear(&self) {
        self.subscriptions.write().clear();
        if self.config.enable_logging {
            info!("Cleared all event handlers");
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Check if a subscription is registered
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.read().iter().any(|s| s.id == id)
    }
}

impl<E, Err> Clone for EventBus<E, Err> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: self.subscriptions.clone(),
            next_id: self.next_id.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E, Err> Default for EventBus<E, Err>
where
    E: DomainEvent,
    Err: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, Err> fmt::Debug for EventBus<E, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.subscriptions.read().len())
            .field("config", &self.config)
            .finish()
    }
}

/// Event bus builder
pub struct EventBusBuilder {
    config: EventBusConfig,
}

impl EventBusBuilder {
    /// Create new event bus builder
    pub fn new() -> Self {
        Self {
            config: EventBusConfig::default(),
        }
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Enable/disable warnings for events nobody handles
    pub fn warn_unhandled(mut self, enabled: bool) -> Self {
        self.config.warn_unhandled = enabled;
        self
    }

    /// Build the event bus
    pub fn build<E, Err>(self) -> EventBus<E, Err>
    where
        E: DomainEvent,
        Err: Send + 'static,
    {
        EventBus::with_config(self.config)
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
