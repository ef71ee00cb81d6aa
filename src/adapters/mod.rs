//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the query engine to external systems:
//! - `events` - Event router over a transport connection
//! - `websocket` - WebSocket transport and control messages
//! - `http` - Backend REST client

pub mod events;
pub mod http;
pub mod websocket;

pub use events::{Backoff, EventRouter, EventRouterConfig};
pub use http::{ReqwestApiClient, ReqwestApiConfig};
pub use websocket::{ControlMessage, WebSocketTransport};
