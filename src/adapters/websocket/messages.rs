//! Event channel control messages.
//!
//! Inbound frames are serialized [`Event`](crate::domain::foundation::Event)s;
//! the only outbound traffic is these commands.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::WILDCARD;

// ============================================
// Client → Server Messages
// ============================================

/// Commands sent to the event server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Start receiving events of type `event` for `user`.
    Subscribe {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
}

impl ControlMessage {
    /// Subscribes to every event visible to `user`. Sent on each open.
    pub fn subscribe_all(user: Option<String>) -> Self {
        ControlMessage::Subscribe {
            event: WILDCARD.to_string(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_all_serializes_with_cmd_tag() {
        let msg = ControlMessage::subscribe_all(Some("alice".into()));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"cmd": "subscribe", "event": "*", "user": "alice"})
        );
    }

    #[test]
    fn anonymous_subscribe_omits_user() {
        let msg = ControlMessage::subscribe_all(None);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"cmd": "subscribe", "event": "*"})
        );
    }
}
