//! The real-time core of Parley: routing, presence, typing signals and
//! state reconciliation over a [`ChatStore`](parley_core::store::ChatStore).
//!
//! [`Hub`] is the entry point. Transports (the WebSocket server, the REST
//! API) attach connections to it and feed it [`InboundEvent`]s; it applies
//! them to the store or to ephemeral state and fans the results out through
//! the [`RoomRouter`].
//!
//! [`InboundEvent`]: parley_core::event::InboundEvent

pub mod config;
pub mod presence;
pub mod router;
pub mod sequencer;
pub mod typing;

mod directory;
mod engagement;
mod hub;
mod receipts;

pub use config::{HubConfig, ReactionFanout};
pub use hub::{Connection, Hub, Session};
pub use presence::PresenceTracker;
pub use router::{ConnectionId, Room, RoomRouter};
pub use typing::TypingCoordinator;
