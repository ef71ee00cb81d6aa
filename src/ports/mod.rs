//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the query engine and the outside world. Adapters implement these ports.
//!
//! ## Event Ports
//!
//! - `EventSubscriber` - Register interest in inbound events by key
//! - `EventHandler` - Callback invoked for matching events
//! - `Transport` / `TransportConnection` - Bidirectional text-frame channel
//!
//! ## Backend Ports
//!
//! - `ApiClient` - REST calls used to fetch datasets

mod api_client;
mod event_subscriber;
mod transport;

pub use api_client::{ApiClient, ApiResponse, HttpMethod};
pub use event_subscriber::{handler_fn, EventHandler, EventSubscriber, FnHandler};
pub use transport::{Transport, TransportConnection};
