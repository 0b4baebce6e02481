use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

/// A message as persisted in history.
///
/// Rows are immutable once written. Ordering within a room or identity pair
/// is by `created_at` ascending, ties broken by insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique identifier, assigned once at relay time
    pub id: String,
    /// Room key the message was relayed on
    pub room: String,
    /// Identity of the sender
    pub sender: String,
    /// Identity of the recipient; `None` means broadcast
    pub recipient: Option<String>,
    /// Message content; may be empty
    pub content: String,
    /// Creation timestamp, RFC-3339 UTC
    pub created_at: String,
}

impl StoredMessage {
    /// Build a message with a freshly assigned id and timestamp.
    ///
    /// The id and timestamp are assigned exactly once, here, so every
    /// fan-out copy of the same logical message carries identical values.
    pub fn assign(
        room: impl Into<String>,
        sender: impl Into<String>,
        recipient: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();

        Self {
            id: format!("{}-{}", now.timestamp_millis(), suffix),
            room: room.into(),
            sender: sender.into(),
            recipient: recipient.filter(|r| !r.is_empty()),
            content: content.into(),
            created_at: now.to_rfc3339(),
        }
    }

    /// Whether this message was a broadcast rather than a directed send.
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}
