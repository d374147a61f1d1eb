//! Alert packet format and payload codec
//!
//! Exactly three packet kinds travel on the shared alert port, distinguished
//! by an explicit `type` tag in the JSON payload. Decoding never panics and
//! never takes down a loop: an unknown tag or malformed payload yields a
//! [`PacketError`] and the caller drops the packet.

use serde::{Deserialize, Serialize};

use crate::errors::PacketError;
use crate::geo::GeoLocation;
use crate::types::{EmergencyId, Timestamp};

// ----------------------------------------------------------------------------
// Packet Kinds
// ----------------------------------------------------------------------------

/// Wire tag for emergency broadcasts
pub const KIND_EMERGENCY: &str = "EMERGENCY";
/// Wire tag for delivery acknowledgements
pub const KIND_ACK: &str = "ACK";
/// Wire tag for all-clear notices
pub const KIND_CLEAR: &str = "CLEAR";

/// The three alert packet kinds carried on the shared port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaydayPacket {
    /// Repeated broadcast announcing an active emergency
    #[serde(rename = "EMERGENCY")]
    Emergency(EmergencyPayload),
    /// Directed delivery confirmation for a received emergency
    #[serde(rename = "ACK")]
    Ack(AckPayload),
    /// Broadcast notice that an emergency is resolved
    #[serde(rename = "CLEAR")]
    Clear(ClearPayload),
}

/// Body of an EMERGENCY packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyPayload {
    pub emergency_id: EmergencyId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    pub timestamp: Timestamp,
}

/// Body of an ACK packet; the acknowledging node's identity comes from the
/// transport envelope, not the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub emergency_id: EmergencyId,
    pub timestamp: Timestamp,
}

/// Body of a CLEAR packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearPayload {
    pub emergency_id: EmergencyId,
    pub timestamp: Timestamp,
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

impl MaydayPacket {
    /// Serialize to the transport payload format
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        serde_json::to_vec(self).map_err(|e| PacketError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Deserialize from the transport payload format
    ///
    /// Unknown extra fields are ignored for forward compatibility; an unknown
    /// `type` tag is reported distinctly from structural damage.
    pub fn decode(payload: &[u8]) -> Result<Self, PacketError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| PacketError::Malformed {
                reason: e.to_string(),
            })?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(PacketError::MissingKind)?;

        match kind {
            KIND_EMERGENCY | KIND_ACK | KIND_CLEAR => {
                serde_json::from_value(value).map_err(|e| PacketError::Malformed {
                    reason: e.to_string(),
                })
            }
            other => Err(PacketError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }

    /// The wire tag of this packet, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            MaydayPacket::Emergency(_) => KIND_EMERGENCY,
            MaydayPacket::Ack(_) => KIND_ACK,
            MaydayPacket::Clear(_) => KIND_CLEAR,
        }
    }

    /// The emergency id every packet kind carries
    pub fn emergency_id(&self) -> EmergencyId {
        match self {
            MaydayPacket::Emergency(p) => p.emergency_id,
            MaydayPacket::Ack(p) => p.emergency_id,
            MaydayPacket::Clear(p) => p.emergency_id,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
