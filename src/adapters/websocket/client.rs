//! WebSocket transport for the event channel.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::domain::foundation::DomainError;
use crate::ports::{Transport, TransportConnection};

/// Connects to the event server at a fixed `ws://` or `wss://` URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, DomainError> {
        tracing::debug!(url = %self.url, "Connecting to event channel");
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| {
                DomainError::transport(format!("WebSocket connect failed: {}", e))
                    .with_detail("url", self.url.clone())
            })?;
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

/// An open WebSocket carrying serialized events as text frames.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), DomainError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| DomainError::transport(format!("WebSocket send failed: {}", e)))
    }

    async fn next_frame(&mut self) -> Option<Result<String, DomainError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return None,
                // Binary, ping and pong frames carry no events.
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(DomainError::transport(format!(
                        "WebSocket read failed: {}",
                        e
                    ))))
                }
            }
        }
    }
}
