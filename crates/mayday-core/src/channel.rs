//! Channel communication protocol types
//!
//! All inter-task communication flows through these message types:
//!
//! - `Command`: shell/automation → engine
//! - `Event`: transport → engine
//! - `Effect`: engine → transport (external side effects only)
//! - `AppEvent`: engine → shell (asynchronous notifications)
//!
//! Inbound packet delivery is modeled as a bounded queue with the engine as
//! the single consumer, which serializes every state mutation without ad hoc
//! locking at callback sites.

use tokio::sync::{mpsc, oneshot};

use crate::geo::GeoLocation;
use crate::registry::IncomingAlert;
use crate::session::StatusSnapshot;
use crate::types::{EmergencyId, NodeId, Timestamp};
use crate::Result;

// ----------------------------------------------------------------------------
// Command: Shell/External → Engine
// ----------------------------------------------------------------------------

/// Commands sent from the shell and automation to the engine task. Replies
/// travel back over the embedded oneshot senders; a dropped reply means the
/// caller went away and is not an error.
#[derive(Debug)]
pub enum Command {
    /// Begin (or restart) the emergency broadcast
    Start {
        message: Option<String>,
        location: Option<GeoLocation>,
        reply: oneshot::Sender<EmergencyId>,
    },
    /// Stop the broadcast and announce all-clear
    Stop { reply: oneshot::Sender<Result<()>> },
    /// Re-announce all-clear for the most recent emergency
    Clear { reply: oneshot::Sender<Result<()>> },
    /// Snapshot the session, acknowledgements, and incoming alerts
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    /// Shut the engine down gracefully (best-effort final CLEAR)
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Engine
// ----------------------------------------------------------------------------

/// Events pushed by the transport glue into the engine
#[derive(Debug, Clone)]
pub enum Event {
    /// A raw payload arrived on some port
    PacketReceived {
        from: NodeId,
        port: u16,
        payload: Vec<u8>,
        received_at: Timestamp,
    },
    /// A position report arrived (from any node, related or not)
    PositionReceived {
        from: NodeId,
        location: GeoLocation,
        received_at: Timestamp,
    },
    /// The link to the radio came up
    LinkUp,
    /// The link to the radio went down; broadcasting pauses until LinkUp
    LinkDown,
}

// ----------------------------------------------------------------------------
// Effect: Engine → Transport
// ----------------------------------------------------------------------------

/// External side effects executed by the transport task
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Broadcast a payload to every reachable participant
    BroadcastPacket { port: u16, payload: Vec<u8> },
    /// Send a payload to one participant
    SendPacket {
        to: NodeId,
        port: u16,
        payload: Vec<u8>,
    },
}

// ----------------------------------------------------------------------------
// AppEvent: Engine → Shell
// ----------------------------------------------------------------------------

/// Asynchronous notifications for the shell; delivered best-effort (the
/// engine drops them when the shell is not draining its queue)
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Another participant announced an emergency
    EmergencyReceived { alert: IncomingAlert },
    /// An emergency we were tracking was resolved by its originator
    AlertCleared {
        from: NodeId,
        emergency_id: EmergencyId,
    },
    /// A node confirmed receipt of our emergency
    AckReceived {
        from: NodeId,
        emergency_id: EmergencyId,
    },
    /// A node came within the alert radius
    ProximityAlert { node: NodeId, distance_m: f64 },
    /// The scheduler put one of our emergency broadcasts on the air
    BroadcastSent {
        emergency_id: EmergencyId,
        at: Timestamp,
    },
    /// The radio link changed state
    LinkStatusChanged { up: bool },
}

// ----------------------------------------------------------------------------
// Channel Aliases and Constructors
// ----------------------------------------------------------------------------

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type EffectSender = mpsc::Sender<Effect>;
pub type EffectReceiver = mpsc::Receiver<Effect>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;

/// Create a bounded command channel
pub fn create_command_channel(buffer: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(buffer)
}

/// Create a bounded event channel
pub fn create_event_channel(buffer: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer)
}

/// Create a bounded effect channel
pub fn create_effect_channel(buffer: usize) -> (EffectSender, EffectReceiver) {
    mpsc::channel(buffer)
}

/// Create a bounded app-event channel
pub fn create_app_event_channel(buffer: usize) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(buffer)
}
