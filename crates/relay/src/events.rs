//! Wire events exchanged with chat clients.

use pawline_history::StoredMessage;
use serde::{Deserialize, Serialize};

/// WebSocket close code sent on protocol violations (missing identity).
pub const POLICY_VIOLATION: u16 = 1008;

/// WebSocket close code sent when a connection fails its liveness checks.
pub const GOING_AWAY: u16 = 1001;

/// Events received from clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Claim an identity for this connection. Repeated joins overwrite the
    /// identity rather than fail.
    Join { identity: String },
    /// Relay a message. Without a recipient it is broadcast to the sender's
    /// room; with one it is delivered to the sender's and recipient's
    /// connections only.
    Send {
        #[serde(default)]
        recipient: Option<String>,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: Option<String>,
    },
    /// Request the message history between this connection's identity and a
    /// peer identity.
    LoadPrivateHistory { peer: String },
}

/// Events sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full list of online identities, re-sent after every membership change.
    Presence { users: Vec<String> },
    /// Discrete join/leave notice, scoped to the affected room.
    PresenceNotice {
        event: PresenceChange,
        identity: String,
    },
    /// Room-scoped history replay, sent once after join.
    History { messages: Vec<StoredMessage> },
    /// Identity-pair history, sent in response to `load_private_history`.
    PrivateHistory { messages: Vec<StoredMessage> },
    /// One relayed message. Every fan-out copy carries identical id and
    /// timestamp.
    Message {
        id: String,
        sender: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
        content: String,
        created_at: String,
        message_type: String,
    },
}

impl ServerEvent {
    pub fn message(stored: &StoredMessage, message_type: &str) -> Self {
        Self::Message {
            id: stored.id.clone(),
            sender: stored.sender.clone(),
            recipient: stored.recipient.clone(),
            content: stored.content.clone(),
            created_at: stored.created_at.clone(),
            message_type: message_type.to_string(),
        }
    }
}

/// Direction of a discrete presence notice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceChange {
    Join,
    Leave,
}

/// Frames handed from the transport to the relay's connection writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    Ping,
    Close { code: u16, reason: String },
}

/// Result of the single upfront parse of an inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Event(ClientEvent),
    PlainText(String),
}

/// Parse an inbound frame leniently.
///
/// Anything that is not a recognised structured event degrades to plain
/// text content; malformed payloads are never rejected.
pub fn parse_frame(raw: &str) -> InboundFrame {
    match serde_json::from_str::<ClientEvent>(raw) {
        Ok(event) => InboundFrame::Event(event),
        Err(_) => InboundFrame::PlainText(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_frame_accepts_join_event() {
        let frame = parse_frame(r#"{"type":"join","identity":"Alice"}"#);
        assert_eq!(
            frame,
            InboundFrame::Event(ClientEvent::Join {
                identity: "Alice".to_string()
            })
        );
    }

    #[test]
    fn parse_frame_defaults_optional_send_fields() {
        let frame = parse_frame(r#"{"type":"send","content":"hello"}"#);
        match frame {
            InboundFrame::Event(ClientEvent::Send {
                recipient,
                content,
                message_type,
            }) => {
                assert!(recipient.is_none());
                assert_eq!(content, "hello");
                assert!(message_type.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn parse_frame_degrades_malformed_json_to_plain_text() {
        let frame = parse_frame("not json{");
        assert_eq!(frame, InboundFrame::PlainText("not json{".to_string()));
    }

    #[test]
    fn parse_frame_degrades_unknown_event_shape_to_plain_text() {
        let frame = parse_frame(r#"{"kind":"mystery"}"#);
        assert_eq!(
            frame,
            InboundFrame::PlainText(r#"{"kind":"mystery"}"#.to_string())
        );
    }

    #[test]
    fn server_message_event_serializes_with_message_tag() {
        let stored = StoredMessage::assign("global", "Alice", None, "hi");
        let event = ServerEvent::message(&stored, "text");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["sender"], "Alice");
        assert_eq!(value["content"], "hi");
        assert!(value.get("recipient").is_none(), "broadcast omits recipient");
    }

    #[test]
    fn presence_notice_serializes_event_direction() {
        let event = ServerEvent::PresenceNotice {
            event: PresenceChange::Leave,
            identity: "Bob".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "presence_notice");
        assert_eq!(value["event"], "leave");
        assert_eq!(value["identity"], "Bob");
    }
}
