//! Proximity detection from unrelated position packets
//!
//! Any node broadcasting its position, whether or not it runs this engine,
//! can trip a proximity alert when it comes within the configured radius of
//! us. Alerts are debounced per source node so a nearby node lingering at the
//! edge of the radius does not fire on every position packet.

use std::collections::HashMap;
use std::time::Duration;

use crate::geo::{distance_meters, GeoLocation};
use crate::types::{NodeId, TimeSource, Timestamp};

/// Cooldown before the same node may trigger another proximity alert
pub const REALERT_COOLDOWN: Duration = Duration::from_secs(300);

/// Cap on debounce state; positions come from arbitrary nodes on the mesh
pub const MAX_TRACKED_NODES: usize = 1024;

// ----------------------------------------------------------------------------
// Proximity Monitor
// ----------------------------------------------------------------------------

/// Evaluates position reports against the alert radius, with per-node
/// debounce state
#[derive(Debug)]
pub struct ProximityMonitor<T: TimeSource> {
    alert_radius_m: u32,
    cooldown: Duration,
    last_alerted: HashMap<NodeId, Timestamp>,
    time_source: T,
}

impl<T: TimeSource> ProximityMonitor<T> {
    /// Create a monitor; a radius of 0 disables it entirely
    pub fn new(alert_radius_m: u32, time_source: T) -> Self {
        Self::with_cooldown(alert_radius_m, REALERT_COOLDOWN, time_source)
    }

    /// Create a monitor with a custom re-alert cooldown
    pub fn with_cooldown(alert_radius_m: u32, cooldown: Duration, time_source: T) -> Self {
        Self {
            alert_radius_m,
            cooldown,
            last_alerted: HashMap::new(),
            time_source,
        }
    }

    /// Whether the monitor does anything at all
    pub fn is_enabled(&self) -> bool {
        self.alert_radius_m > 0
    }

    /// Evaluate a position report from `node`. Returns the distance in meters
    /// when a proximity alert should fire, None otherwise. Disabled monitors
    /// compute no distances.
    pub fn observe(
        &mut self,
        node: NodeId,
        theirs: GeoLocation,
        ours: GeoLocation,
    ) -> Option<f64> {
        if !self.is_enabled() {
            return None;
        }

        let distance = distance_meters(ours, theirs);
        if distance > f64::from(self.alert_radius_m) {
            return None;
        }

        let now = self.time_source.now();
        if let Some(last) = self.last_alerted.get(&node) {
            if now.duration_since(*last) < self.cooldown {
                return None;
            }
        }

        self.last_alerted.insert(node, now);
        Some(distance)
    }

    /// Drop debounce state that has gone cold, and clamp unbounded growth;
    /// returns how many entries were evicted
    pub fn evict_cold(&mut self) -> usize {
        let now = self.time_source.now();
        let before = self.last_alerted.len();
        let cooldown = self.cooldown;
        self.last_alerted
            .retain(|_, at| now.duration_since(*at) < cooldown);

        if self.last_alerted.len() > MAX_TRACKED_NODES {
            let excess = self.last_alerted.len() - MAX_TRACKED_NODES;
            let mut by_age: Vec<(NodeId, Timestamp)> =
                self.last_alerted.iter().map(|(n, t)| (*n, *t)).collect();
            by_age.sort_by_key(|(_, at)| *at);
            for (node, _) in by_age.iter().take(excess) {
                self.last_alerted.remove(node);
            }
        }

        before - self.last_alerted.len()
    }

    /// Number of nodes with live debounce state
    pub fn tracked_nodes(&self) -> usize {
        self.last_alerted.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MockTimeSource;

    fn here() -> GeoLocation {
        GeoLocation::new(45.0, 7.0).unwrap()
    }

    /// A point roughly `meters` east of `from` (good enough at this scale)
    fn east_of(from: GeoLocation, meters: f64) -> GeoLocation {
        let degree_m = 111_195.0 * from.latitude.to_radians().cos();
        GeoLocation::new(from.latitude, from.longitude + meters / degree_m).unwrap()
    }

    fn monitor(radius: u32) -> (ProximityMonitor<MockTimeSource>, MockTimeSource) {
        let time = MockTimeSource::new();
        time.set_time(1_000_000);
        (ProximityMonitor::new(radius, time.clone()), time)
    }

    #[test]
    fn test_alert_inside_radius_once() {
        let (mut monitor, _time) = monitor(500);
        let node = NodeId::new(3);

        let d = monitor.observe(node, east_of(here(), 499.0), here());
        assert!(d.is_some());
        assert!(d.unwrap() <= 500.0);

        // Closer still, but inside the debounce window: no re-alert
        assert!(monitor.observe(node, east_of(here(), 480.0), here()).is_none());
    }

    #[test]
    fn test_realert_after_cooldown() {
        let (mut monitor, time) = monitor(500);
        let node = NodeId::new(3);

        assert!(monitor.observe(node, east_of(here(), 100.0), here()).is_some());
        time.advance(REALERT_COOLDOWN.as_millis() as u64 + 1);
        assert!(monitor.observe(node, east_of(here(), 100.0), here()).is_some());
    }

    #[test]
    fn test_outside_radius_no_alert() {
        let (mut monitor, _time) = monitor(500);
        assert!(monitor
            .observe(NodeId::new(3), east_of(here(), 2_000.0), here())
            .is_none());
        assert_eq!(monitor.tracked_nodes(), 0);
    }

    #[test]
    fn test_zero_radius_disables_monitor() {
        let (mut monitor, _time) = monitor(0);
        assert!(!monitor.is_enabled());
        assert!(monitor.observe(NodeId::new(3), here(), here()).is_none());
    }

    #[test]
    fn test_nodes_are_debounced_independently() {
        let (mut monitor, _time) = monitor(500);
        assert!(monitor
            .observe(NodeId::new(1), east_of(here(), 100.0), here())
            .is_some());
        assert!(monitor
            .observe(NodeId::new(2), east_of(here(), 100.0), here())
            .is_some());
    }

    #[test]
    fn test_cold_state_is_evicted() {
        let (mut monitor, time) = monitor(500);
        monitor.observe(NodeId::new(1), east_of(here(), 100.0), here());
        assert_eq!(monitor.tracked_nodes(), 1);

        time.advance(REALERT_COOLDOWN.as_millis() as u64 + 1);
        assert_eq!(monitor.evict_cold(), 1);
        assert_eq!(monitor.tracked_nodes(), 0);
    }
}
