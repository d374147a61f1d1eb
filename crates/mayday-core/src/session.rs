//! Local emergency session lifecycle
//!
//! The session state machine is the single source of truth for "am I
//! currently signaling an emergency". It has two phases, Idle and Active,
//! and exactly one session may be active at a time. Each `start` mints a
//! fresh emergency id, including a `start` issued while already active,
//! which restarts the episode under a new id (the previous id stays valid
//! for late acknowledgements via the tracker's recent-id history).

use serde::Serialize;

use crate::errors::CommandError;
use crate::geo::GeoLocation;
use crate::registry::IncomingAlert;
use crate::types::{EmergencyId, NodeId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Emergency Session
// ----------------------------------------------------------------------------

/// One broadcast episode originated by this node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencySession {
    pub id: EmergencyId,
    pub message: String,
    pub location: Option<GeoLocation>,
    pub started_at: Timestamp,
    pub active: bool,
    pub last_sent_at: Option<Timestamp>,
    pub sent_count: u64,
}

/// Result of a `start` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub id: EmergencyId,
    /// True when `start` interrupted an already-active session
    pub restarted: bool,
}

// ----------------------------------------------------------------------------
// Session State Machine
// ----------------------------------------------------------------------------

/// Idle/Active lifecycle of the local emergency session
#[derive(Debug)]
pub struct SessionState<T: TimeSource> {
    /// Most recent session; retained after deactivation so `clear` can
    /// re-send its id
    current: Option<EmergencySession>,
    time_source: T,
}

impl<T: TimeSource> SessionState<T> {
    pub fn new(time_source: T) -> Self {
        Self {
            current: None,
            time_source,
        }
    }

    /// Whether a session is currently active
    pub fn is_active(&self) -> bool {
        self.current.as_ref().map(|s| s.active).unwrap_or(false)
    }

    /// The active session, if any
    pub fn active_session(&self) -> Option<&EmergencySession> {
        self.current.as_ref().filter(|s| s.active)
    }

    /// The most recent session, active or not
    pub fn current_session(&self) -> Option<&EmergencySession> {
        self.current.as_ref()
    }

    /// The most recently used emergency id, active or not
    pub fn last_id(&self) -> Option<EmergencyId> {
        self.current.as_ref().map(|s| s.id)
    }

    /// Begin a new broadcast episode with a fresh id. Valid from either
    /// phase; from Active this is a restart under a new id.
    pub fn start(&mut self, message: String, location: Option<GeoLocation>) -> StartOutcome {
        let restarted = self.is_active();
        let id = EmergencyId::generate();
        self.current = Some(EmergencySession {
            id,
            message,
            location,
            started_at: self.time_source.now(),
            active: true,
            last_sent_at: None,
            sent_count: 0,
        });
        StartOutcome { id, restarted }
    }

    /// Deactivate the session; returns the id whose CLEAR should be sent
    pub fn stop(&mut self) -> Result<EmergencyId, CommandError> {
        match self.current.as_mut() {
            Some(session) if session.active => {
                session.active = false;
                Ok(session.id)
            }
            _ => Err(CommandError::NoActiveSession),
        }
    }

    /// The id to re-announce as cleared, regardless of the current phase
    pub fn clear_target(&self) -> Result<EmergencyId, CommandError> {
        self.last_id().ok_or(CommandError::NoPriorSession)
    }

    /// Record a completed broadcast for the given id; ignored when the id no
    /// longer matches the current session (a send that raced a restart)
    pub fn record_send(&mut self, id: EmergencyId, at: Timestamp) {
        if let Some(session) = self.current.as_mut() {
            if session.id == id {
                session.last_sent_at = Some(at);
                session.sent_count += 1;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Status Snapshot
// ----------------------------------------------------------------------------

/// Read-only view assembled for the `status` query
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub session_active: bool,
    pub emergency_id: Option<EmergencyId>,
    pub started_at: Option<Timestamp>,
    pub sent_count: u64,
    /// Nodes with a non-stale acknowledgement for the current emergency
    pub acknowledged_by: Vec<NodeId>,
    /// Alerts from other participants still marked active
    pub incoming_alerts: Vec<IncomingAlert>,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
