//! The history store seam between the relay and durable storage.

use crate::message::StoredMessage;
use crate::types::HistoryResult;

/// Append-only message history.
///
/// The relay treats the store as an opaque sequential-consistency boundary:
/// writes are attempted before fan-out, and a failed write never blocks
/// delivery. Implementations must preserve insertion order for equal
/// timestamps.
pub trait HistoryStore {
    /// Persist a message. History is append-only; there is no update or
    /// delete counterpart.
    async fn append(&self, message: &StoredMessage) -> HistoryResult<()>;

    /// The most recent `limit` messages for a room, ascending by creation
    /// time.
    async fn recent(&self, room: &str, limit: u32) -> HistoryResult<Vec<StoredMessage>>;

    /// All messages exchanged between two identities, in both directions,
    /// ascending by creation time.
    async fn between(&self, a: &str, b: &str) -> HistoryResult<Vec<StoredMessage>>;
}
