//! Pawline History Crate
//!
//! Durable, append-only message history for the chat relay. The relay writes
//! every message through a [`HistoryStore`] before fan-out and reads it back
//! for replay on join; no update or delete surface exists.

pub mod connection;
pub mod memory;
pub mod message;
pub mod migrations;
pub mod sqlite;
pub mod store;
pub mod types;

pub use connection::prepare_database;
pub use memory::MemoryHistoryStore;
pub use message::StoredMessage;
pub use migrations::run_migrations;
pub use sqlite::SqliteHistoryStore;
pub use store::HistoryStore;
pub use types::{HistoryError, HistoryResult};
