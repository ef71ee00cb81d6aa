//! Transport Port - Interface for the bidirectional event channel.
//!
//! The event router owns one connection at a time and reconnects through
//! [`Transport::connect`] after it closes.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Factory for event channel connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection.
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, DomainError>;
}

/// One open event channel carrying discrete text frames.
#[async_trait]
pub trait TransportConnection: Send {
    async fn send(&mut self, text: String) -> Result<(), DomainError>;

    /// Next inbound text frame.
    ///
    /// Returns `None` once the peer has closed the connection. Non-text
    /// frames are skipped by the implementation.
    async fn next_frame(&mut self) -> Option<Result<String, DomainError>>;
}
