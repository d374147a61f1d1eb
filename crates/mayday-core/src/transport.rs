//! Transport abstraction for the mesh link
//!
//! The engine never talks to radio hardware directly. A transport
//! implementation (TCP gateway, in-memory mock) provides best-effort sends
//! and a handful of local node facts; inbound traffic is pushed into the
//! engine's event channel by the transport glue, not pulled through this
//! trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::geo::GeoLocation;
use crate::types::NodeId;
use crate::Result;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Unified interface to the mesh radio link
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast a payload to all reachable participants on a port
    async fn broadcast(&self, port: u16, payload: &[u8]) -> Result<()>;

    /// Send a payload to a specific participant on a port
    async fn send_to(&self, dest: NodeId, port: u16, payload: &[u8]) -> Result<()>;

    /// Hardware-imposed minimum spacing between transmissions
    fn min_send_spacing(&self) -> Duration;

    /// This device's identity on the mesh
    fn local_node(&self) -> NodeId;

    /// Last known position of this device, if any
    fn local_position(&self) -> Option<GeoLocation>;

    /// Last known battery level of this device (percent), if any
    fn battery_level(&self) -> Option<u8>;
}
