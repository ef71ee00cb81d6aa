//! Inbound events and the subscription filter predicate.
//!
//! - `Event` - A routed notification: event name, routing metadata, payload
//! - `EventFilter` - What a subscription is interested in
//!
//! # Matching rules
//!
//! | filter field | behavior |
//! |---|---|
//! | `event` | equal to `event.event`, or the wildcard `*` |
//! | `object`, `app`, `user` | if set and not `*`: event field must be present and equal |
//! | `plugin`, `key` | if set: event field must be present and equal (no wildcard) |
//!
//! Unset filter fields impose no constraint.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Filter value that matches anything for the wildcard-capable fields.
pub const WILDCARD: &str = "*";

/// An event delivered over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `timeseries_data_write`.
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Arbitrary payload.
    #[serde(default)]
    pub data: JsonValue,
}

impl Event {
    /// Creates an event with no routing metadata and a null payload.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            object: None,
            app: None,
            user: None,
            plugin: None,
            key: None,
            data: JsonValue::Null,
        }
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    /// Parses a single text frame.
    pub fn from_frame(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Subscription filter. See the module docs for the matching rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl EventFilter {
    /// Filter for a specific event name.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            object: None,
            app: None,
            user: None,
            plugin: None,
            key: None,
        }
    }

    /// Filter matching every event name.
    pub fn any() -> Self {
        Self::new(WILDCARD)
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Returns true if `event` should be delivered to a subscription with this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if self.event != event.event && self.event != WILDCARD {
            return false;
        }

        wildcard_field_matches(self.object.as_deref(), event.object.as_deref())
            && wildcard_field_matches(self.app.as_deref(), event.app.as_deref())
            && wildcard_field_matches(self.user.as_deref(), event.user.as_deref())
            && exact_field_matches(self.plugin.as_deref(), event.plugin.as_deref())
            && exact_field_matches(self.key.as_deref(), event.key.as_deref())
    }
}

fn wildcard_field_matches(filter: Option<&str>, event: Option<&str>) -> bool {
    match filter {
        None | Some(WILDCARD) => true,
        Some(wanted) => event == Some(wanted),
    }
}

fn exact_field_matches(filter: Option<&str>, event: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(wanted) => event == Some(wanted),
    }
}
