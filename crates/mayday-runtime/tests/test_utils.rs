//! Shared utilities for runtime integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mayday_core::channel::EventSender;
use mayday_core::geo::GeoLocation;
use mayday_core::transport::Transport;
use mayday_core::types::{NodeId, Timestamp};
use mayday_core::{Event, Result};

// ----------------------------------------------------------------------------
// Mock Link
// ----------------------------------------------------------------------------

/// One send recorded by the mock link
#[derive(Debug, Clone)]
pub struct SentPacket {
    /// None for broadcasts
    pub to: Option<NodeId>,
    pub port: u16,
    pub payload: Vec<u8>,
}

/// In-memory transport that records every send and can optionally deliver
/// sends straight into a peer engine's event channel
pub struct MockLink {
    node: NodeId,
    spacing: Duration,
    position: Mutex<Option<GeoLocation>>,
    battery: Mutex<Option<u8>>,
    sent: Mutex<Vec<SentPacket>>,
    peer_events: Mutex<Option<EventSender>>,
}

impl MockLink {
    pub fn new(node: u32) -> Arc<Self> {
        Self::with_spacing(node, Duration::ZERO)
    }

    pub fn with_spacing(node: u32, spacing: Duration) -> Arc<Self> {
        Arc::new(Self {
            node: NodeId::new(node),
            spacing,
            position: Mutex::new(None),
            battery: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            peer_events: Mutex::new(None),
        })
    }

    /// Deliver everything this link sends into `events`, as if a peer
    /// received it off the air
    pub fn connect_peer(&self, events: EventSender) {
        *self.peer_events.lock().unwrap() = Some(events);
    }

    pub fn set_position(&self, location: GeoLocation) {
        *self.position.lock().unwrap() = Some(location);
    }

    pub fn set_battery(&self, percent: u8) {
        *self.battery.lock().unwrap() = Some(percent);
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    async fn record(&self, to: Option<NodeId>, port: u16, payload: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(SentPacket {
            to,
            port,
            payload: payload.to_vec(),
        });

        let peer = self.peer_events.lock().unwrap().clone();
        if let Some(events) = peer {
            let _ = events
                .send(Event::PacketReceived {
                    from: self.node,
                    port,
                    payload: payload.to_vec(),
                    received_at: Timestamp::now(),
                })
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockLink {
    async fn broadcast(&self, port: u16, payload: &[u8]) -> Result<()> {
        self.record(None, port, payload).await
    }

    async fn send_to(&self, dest: NodeId, port: u16, payload: &[u8]) -> Result<()> {
        self.record(Some(dest), port, payload).await
    }

    fn min_send_spacing(&self) -> Duration {
        self.spacing
    }

    fn local_node(&self) -> NodeId {
        self.node
    }

    fn local_position(&self) -> Option<GeoLocation> {
        *self.position.lock().unwrap()
    }

    fn battery_level(&self) -> Option<u8> {
        *self.battery.lock().unwrap()
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Poll `check` every few milliseconds until it passes or the deadline hits
pub async fn wait_for<F: Fn() -> bool>(check: F, timeout: Duration, what: &str) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
