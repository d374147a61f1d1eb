//! Registry of alerts originated by other participants
//!
//! Tracks every emergency we have heard from the mesh, keyed by emergency id.
//! Duplicate broadcasts refresh the existing entry; a CLEAR from the
//! originator flips it inactive without deleting it, so `status` can still
//! show the resolution until the grace window passes.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::GeoLocation;
use crate::types::{EmergencyId, NodeId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Incoming Alert
// ----------------------------------------------------------------------------

/// One emergency broadcast received from another participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAlert {
    pub emergency_id: EmergencyId,
    pub originator: NodeId,
    pub message: String,
    pub location: Option<GeoLocation>,
    pub battery: Option<u8>,
    /// When we last heard this alert (refreshed by duplicates)
    pub received_at: Timestamp,
    /// False once the originator sent a matching CLEAR
    pub active: bool,
}

// ----------------------------------------------------------------------------
// Alert Registry
// ----------------------------------------------------------------------------

/// Registry of incoming alerts with two-tier staleness eviction
#[derive(Debug)]
pub struct AlertRegistry<T: TimeSource> {
    /// Retention for alerts still marked active
    active_retention: Duration,
    /// Shorter window for alerts their originator already cleared
    cleared_grace: Duration,
    alerts: HashMap<EmergencyId, IncomingAlert>,
    time_source: T,
}

impl<T: TimeSource> AlertRegistry<T> {
    pub fn new(active_retention: Duration, cleared_grace: Duration, time_source: T) -> Self {
        Self {
            active_retention,
            cleared_grace,
            alerts: HashMap::new(),
            time_source,
        }
    }

    /// Create or refresh an alert from a received EMERGENCY packet; returns
    /// true when the alert is new
    pub fn upsert(
        &mut self,
        emergency_id: EmergencyId,
        originator: NodeId,
        message: String,
        location: Option<GeoLocation>,
        battery: Option<u8>,
    ) -> bool {
        let now = self.time_source.now();
        match self.alerts.get_mut(&emergency_id) {
            Some(alert) => {
                // Duplicate broadcast: refresh, never duplicate. A broadcast
                // after a CLEAR does not resurrect the entry either; the
                // originator re-announcing starts a new id.
                alert.message = message;
                alert.location = location;
                alert.battery = battery;
                alert.received_at = now;
                false
            }
            None => {
                self.alerts.insert(
                    emergency_id,
                    IncomingAlert {
                        emergency_id,
                        originator,
                        message,
                        location,
                        battery,
                        received_at: now,
                        active: true,
                    },
                );
                true
            }
        }
    }

    /// Mark an alert inactive on a matching CLEAR; returns false when the id
    /// is not tracked (duplicate CLEARs after eviction land here)
    pub fn mark_cleared(&mut self, emergency_id: EmergencyId) -> bool {
        match self.alerts.get_mut(&emergency_id) {
            Some(alert) => {
                alert.active = false;
                true
            }
            None => false,
        }
    }

    /// All alerts still marked active, most recent first
    pub fn active_alerts(&self) -> Vec<IncomingAlert> {
        let mut alerts: Vec<IncomingAlert> = self
            .alerts
            .values()
            .filter(|a| a.active)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        alerts
    }

    /// Look up one alert by id
    pub fn get(&self, emergency_id: EmergencyId) -> Option<&IncomingAlert> {
        self.alerts.get(&emergency_id)
    }

    /// Evict alerts past their retention window; returns how many were
    /// dropped
    pub fn purge_stale(&mut self) -> usize {
        let now = self.time_source.now();
        let before = self.alerts.len();
        let active_retention = self.active_retention;
        let cleared_grace = self.cleared_grace;
        self.alerts.retain(|_, alert| {
            let age = now.duration_since(alert.received_at);
            let limit = if alert.active {
                active_retention
            } else {
                cleared_grace
            };
            age <= limit
        });
        before - self.alerts.len()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
