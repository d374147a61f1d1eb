//! Mayday Core Protocol Implementation
//!
//! This crate provides the foundational types, packet codec, and bookkeeping
//! components for the Mayday emergency beacon: the session state machine,
//! acknowledgement tracker, incoming-alert registry, and proximity monitor.
//! It spawns no tasks of its own; the engine in `mayday-runtime` owns the
//! state and drives these components from its consumer loop.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod geo;
pub mod packet;
pub mod proximity;
pub mod registry;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Effect, Event};
pub use config::{ChannelConfig, MaydayConfig};
pub use errors::{CommandError, MaydayError, PacketError, Result, TransportError};
pub use geo::GeoLocation;
pub use packet::MaydayPacket;
pub use registry::IncomingAlert;
pub use session::StatusSnapshot;
pub use transport::Transport;
pub use types::{EmergencyId, NodeId, SystemTimeSource, TimeSource, Timestamp};
