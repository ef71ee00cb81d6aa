//! EventSubscriber port - Interface for registering interest in inbound events.
//!
//! Subscriptions are local and in-process, keyed by a caller-chosen string.
//! The port hides the transport that produces the events.

use std::sync::Arc;

use crate::domain::foundation::{Event, EventFilter, SubscriptionKey};

/// Callback for events matching a subscription filter.
///
/// Implementations should be:
/// - **Quick** - Delivery is synchronous on the router's task; spawn for slow work
/// - **Isolated** - Must not assume any other handler ran first
///
/// # Example
///
/// ```ignore
/// struct CacheInvalidator { /* ... */ }
///
/// impl EventHandler for CacheInvalidator {
///     fn handle(&self, event: &Event) {
///         // Drop cached entries for event.object...
///     }
///
///     fn name(&self) -> &str {
///         "CacheInvalidator"
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);

    /// Handler name for logging.
    fn name(&self) -> &str;
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(&Event) + Send + Sync,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Port for subscribing to inbound events.
///
/// # Example
///
/// ```ignore
/// let key = SubscriptionKey::new("dashboard")?;
/// subscriber.subscribe(key.clone(), EventFilter::any().object("abc"), handler);
/// // ...
/// subscriber.unsubscribe(&key);
/// ```
pub trait EventSubscriber: Send + Sync {
    /// Registers `handler` under `key`, replacing any previous subscription.
    fn subscribe(&self, key: SubscriptionKey, filter: EventFilter, handler: Arc<dyn EventHandler>);

    /// Removes the subscription under `key`. Unknown keys are ignored.
    fn unsubscribe(&self, key: &SubscriptionKey);

    /// Whether the underlying connection is currently open.
    fn is_connected(&self) -> bool;
}
