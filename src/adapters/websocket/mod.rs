//! WebSocket adapters for the inbound event channel.
//!
//! # Components
//!
//! - [`messages`] - Control commands sent to the event server
//! - [`client`] - `Transport` implementation over `tokio-tungstenite`

pub mod client;
pub mod messages;

pub use client::{WebSocketConnection, WebSocketTransport};
pub use messages::ControlMessage;
