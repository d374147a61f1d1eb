//! Error types for the Mayday protocol
//!
//! This module contains all error types used throughout the engine: packet
//! decode errors, transport errors, command errors, and the main MaydayError
//! type that unifies them all. Nothing here is fatal to a running engine:
//! packet and transport errors are logged and swallowed at the boundary,
//! command errors are reported to the caller, and configuration errors are
//! only surfaced before the engine starts.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Packet decode and validation errors
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("unknown packet kind: {kind}")]
    UnknownKind { kind: String },
    #[error("packet kind tag missing")]
    MissingKind,
    #[error("malformed payload: {reason}")]
    Malformed { reason: String },
}

/// Transport send errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not available: {reason}")]
    Unavailable { reason: String },
    #[error("send failed: {reason}")]
    SendFailed { reason: String },
    #[error("send timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Command errors reported back to the caller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no emergency session is active")]
    NoActiveSession,
    #[error("no prior emergency session to clear")]
    NoPriorSession,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error types for the Mayday engine
#[derive(Debug, Error)]
pub enum MaydayError {
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] PacketError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid command: {0}")]
    InvalidCommand(#[from] CommandError),

    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Channel communication error (internal to the task architecture)
    #[error("channel error: {message}")]
    Channel { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MaydayError {
    /// Create a malformed packet error with a reason
    pub fn malformed<T: Into<String>>(reason: T) -> Self {
        MaydayError::MalformedPacket(PacketError::Malformed {
            reason: reason.into(),
        })
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        MaydayError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        MaydayError::Config {
            reason: reason.into(),
        }
    }

    /// Create a transport-unavailable error with a reason
    pub fn transport_unavailable<T: Into<String>>(reason: T) -> Self {
        MaydayError::Transport(TransportError::Unavailable {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MaydayError>;
