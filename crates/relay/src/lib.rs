//! Pawline Relay Crate
//!
//! The presence-aware message relay behind the Pawline chat service. All
//! mutable relay state (connection registry, room membership) is owned by a
//! single actor task; connections and HTTP callers talk to it through a
//! cloneable [`RelayHandle`].

pub mod events;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod types;

pub use events::{
    parse_frame, ClientEvent, InboundFrame, Outbound, PresenceChange, ServerEvent, GOING_AWAY,
    POLICY_VIOLATION,
};
pub use registry::{ConnId, Registry};
pub use relay::{validate_connect, Relay, RelayHandle, RelaySettings};
pub use rooms::Rooms;
pub use types::{RelayError, RelayResult};
