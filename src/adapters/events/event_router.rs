//! EventRouter - owns the event channel and routes inbound events.
//!
//! ## Connection lifecycle
//!
//! ```text
//! connect ──ok──▶ on_open ──▶ frame loop ──closed──▶ on_close ──▶ sleep(backoff) ─┐
//!    ▲    └─err──────────────────────────────────────▶ on_close ─────────────────┤
//!    └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `on_open` sends the subscribe-all command, resets the backoff and
//! publishes the open time on the connectivity channel. `on_close` publishes
//! `None` and returns the next reconnect delay, or `None` when reconnection
//! is disabled.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `reset_timeout` | 200ms | First reconnect delay, restored on open |
//! | `retry_delta` | 1000ms | Added to the delay after each failure |
//! | `reconnect` | true | Only honored when a username is known |

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::Backoff;
use crate::adapters::websocket::ControlMessage;
use crate::domain::foundation::{DomainError, Event, EventFilter, SubscriptionKey, Timestamp};
use crate::ports::{EventHandler, EventSubscriber, Transport, TransportConnection};

/// Configuration for the EventRouter.
#[derive(Debug, Clone)]
pub struct EventRouterConfig {
    /// Principal named in the subscribe-all command.
    pub username: Option<String>,
    pub reconnect: bool,
    pub reset_timeout: Duration,
    pub retry_delta: Duration,
}

impl Default for EventRouterConfig {
    fn default() -> Self {
        Self {
            username: None,
            reconnect: true,
            reset_timeout: Duration::from_millis(200),
            retry_delta: Duration::from_millis(1000),
        }
    }
}

impl EventRouterConfig {
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_backoff(mut self, reset_timeout: Duration, retry_delta: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self.retry_delta = retry_delta;
        self
    }

    /// Anonymous sessions may be refused by the server, so they never retry.
    fn retries(&self) -> bool {
        self.reconnect && self.username.is_some()
    }
}

struct Subscription {
    filter: EventFilter,
    handler: Arc<dyn EventHandler>,
}

/// Routes events from one live transport connection to local subscriptions.
pub struct EventRouter {
    config: EventRouterConfig,
    subscriptions: RwLock<HashMap<SubscriptionKey, Subscription>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    connectivity: watch::Sender<Option<Timestamp>>,
    backoff: Mutex<Backoff>,
}

impl EventRouter {
    pub fn new(config: EventRouterConfig) -> Self {
        let (connectivity, _) = watch::channel(None);
        let backoff = Backoff::new(config.reset_timeout, config.retry_delta);
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            outbound: Mutex::new(None),
            connectivity,
            backoff: Mutex::new(backoff),
        }
    }

    /// Receiver of the last open time, `None` while disconnected.
    pub fn connectivity(&self) -> watch::Receiver<Option<Timestamp>> {
        self.connectivity.subscribe()
    }

    /// Time the current connection opened.
    pub fn connected_since(&self) -> Option<Timestamp> {
        *self.connectivity.borrow()
    }

    pub fn subscription_count(&self) -> usize {
        self.read_subscriptions().len()
    }

    /// Marks the connection live and queues the subscribe-all command.
    ///
    /// Returns the receiver for outbound frames; the caller writes them to
    /// the connection until it closes.
    pub fn on_open(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.lock_outbound() = Some(tx);
        self.lock_backoff().reset();

        tracing::info!(user = ?self.config.username, "Event channel open");
        self.send(&ControlMessage::subscribe_all(self.config.username.clone()));

        self.connectivity.send_replace(Some(Timestamp::now()));
        rx
    }

    /// Marks the connection down. Returns the delay before reconnecting.
    pub fn on_close(&self) -> Option<Duration> {
        self.lock_outbound().take();
        self.connectivity.send_replace(None);

        if !self.config.retries() {
            tracing::info!("Event channel closed, not reconnecting");
            return None;
        }
        let delay = self.lock_backoff().next_delay();
        tracing::warn!(delay_ms = delay.as_millis() as u64, "Event channel closed, reconnecting");
        Some(delay)
    }

    /// Parses one inbound frame and delivers it to matching subscriptions.
    ///
    /// Malformed frames are logged and dropped.
    pub fn on_message(&self, raw: &str) {
        let event = match Event::from_frame(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, frame = %truncate(raw, 200), "Dropping malformed event frame");
                return;
            }
        };
        self.dispatch(&event);
    }

    /// Delivers an event to every subscription whose filter matches.
    ///
    /// Handlers run after the subscription lock is released, so they may
    /// subscribe or unsubscribe. A subscription added during delivery does
    /// not receive the event being delivered.
    pub fn dispatch(&self, event: &Event) {
        let matching: Vec<Arc<dyn EventHandler>> = self
            .read_subscriptions()
            .values()
            .filter(|s| s.filter.matches(event))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        tracing::trace!(event = %event.event, object = ?event.object, handlers = matching.len(), "Dispatching event");
        for handler in matching {
            handler.handle(event);
        }
    }

    /// Queues a message on the open connection; dropped when closed.
    pub fn send<T: Serialize>(&self, message: &T) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound message");
                return;
            }
        };
        match self.lock_outbound().as_ref() {
            Some(tx) => {
                if tx.send(text).is_err() {
                    tracing::debug!("Outbound channel closed, message dropped");
                }
            }
            None => tracing::debug!("Event channel not open, message dropped"),
        }
    }

    /// Run the connection loop until shutdown signal is received.
    ///
    /// # Arguments
    ///
    /// * `transport` - Factory for new connections
    /// * `shutdown` - Watch channel that signals when to stop
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` on shutdown, or when the connection closes with
    /// reconnection disabled.
    pub async fn run(
        &self,
        transport: &dyn Transport,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), DomainError> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let connected = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                    continue;
                }
                result = transport.connect() => result,
            };

            match connected {
                Ok(mut connection) => {
                    let mut outbound = self.on_open();
                    let stopping = self
                        .pump(connection.as_mut(), &mut outbound, &mut shutdown)
                        .await;
                    if stopping {
                        self.lock_outbound().take();
                        self.connectivity.send_replace(None);
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Event channel connect failed");
                }
            }

            let Some(delay) = self.on_close() else {
                return Ok(());
            };
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Moves frames both ways until the connection closes. Returns `true`
    /// if shutdown was requested.
    async fn pump(
        &self,
        connection: &mut dyn TransportConnection,
        outbound: &mut mpsc::UnboundedReceiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return true;
                    }
                }
                Some(text) = outbound.recv() => {
                    if let Err(e) = connection.send(text).await {
                        tracing::warn!(error = %e, "Event channel send failed");
                        return false;
                    }
                }
                frame = connection.next_frame() => match frame {
                    Some(Ok(text)) => self.on_message(&text),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Event channel read failed");
                        return false;
                    }
                    None => return false,
                },
            }
        }
    }

    fn read_subscriptions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriptionKey, Subscription>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_backoff(&self) -> MutexGuard<'_, Backoff> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(EventRouterConfig::default())
    }
}

impl EventSubscriber for EventRouter {
    fn subscribe(&self, key: SubscriptionKey, filter: EventFilter, handler: Arc<dyn EventHandler>) {
        tracing::debug!(key = %key, handler = handler.name(), "Subscribing");
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Subscription { filter, handler });
    }

    fn unsubscribe(&self, key: &SubscriptionKey) {
        let removed = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            tracing::debug!(key = %key, "Unsubscribed");
        }
    }

    fn is_connected(&self) -> bool {
        self.lock_outbound().is_some()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
