//! Event routing adapters.
//!
//! - `EventRouter` - Owns the event channel and routes events to subscriptions
//! - `Backoff` - Linear reconnect delay

mod backoff;
mod event_router;

pub use backoff::Backoff;
pub use event_router::{EventRouter, EventRouterConfig};
