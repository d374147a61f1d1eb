//! Acknowledgement tracking for locally originated alerts
//!
//! Records which nodes have confirmed receipt of our emergency broadcasts and
//! ages entries out once they pass the acknowledgement timeout. ACKs are only
//! accepted for ids we actually issued: the current session's id or one of a
//! bounded history of recent past ids, so a restart never loses confirmations
//! that were already in flight.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::types::{EmergencyId, NodeId, TimeSource, Timestamp};

/// How many past emergency ids remain acceptable for late ACKs
pub const RECENT_ID_CAPACITY: usize = 4;

// ----------------------------------------------------------------------------
// Acknowledgement Entry
// ----------------------------------------------------------------------------

/// One delivery confirmation from one node for one emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckEntry {
    pub emergency_id: EmergencyId,
    pub sender: NodeId,
    pub received_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Acknowledgement Tracker
// ----------------------------------------------------------------------------

/// Tracks acknowledgements keyed by `(emergency_id, sender)`; at most one
/// entry per sender per emergency, latest receipt wins
#[derive(Debug)]
pub struct AckTracker<T: TimeSource> {
    ack_timeout: Duration,
    entries: HashMap<(EmergencyId, NodeId), Timestamp>,
    /// Ids we issued, oldest first; ACKs for anything else are ignored
    known_ids: VecDeque<EmergencyId>,
    time_source: T,
}

impl<T: TimeSource> AckTracker<T> {
    /// Create a new tracker with the given staleness threshold
    pub fn new(ack_timeout: Duration, time_source: T) -> Self {
        Self {
            ack_timeout,
            entries: HashMap::new(),
            known_ids: VecDeque::new(),
            time_source,
        }
    }

    /// Register a freshly issued emergency id; evicts the oldest known id
    /// (and its entries) once the history is full
    pub fn register_session(&mut self, id: EmergencyId) {
        if self.known_ids.contains(&id) {
            return;
        }
        self.known_ids.push_back(id);
        while self.known_ids.len() > RECENT_ID_CAPACITY {
            if let Some(evicted) = self.known_ids.pop_front() {
                self.entries.retain(|(eid, _), _| *eid != evicted);
            }
        }
    }

    /// Whether ACKs for this id would be accepted
    pub fn is_known(&self, id: EmergencyId) -> bool {
        self.known_ids.contains(&id)
    }

    /// Record an ACK; returns false when the id is not one of ours
    pub fn record_ack(&mut self, id: EmergencyId, sender: NodeId) -> bool {
        if !self.is_known(id) {
            return false;
        }
        self.entries.insert((id, sender), self.time_source.now());
        true
    }

    /// Nodes with a non-stale confirmation for the given emergency, sorted
    pub fn confirmed_for(&self, id: EmergencyId) -> Vec<NodeId> {
        let now = self.time_source.now();
        let mut nodes: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|((eid, _), received_at)| {
                *eid == id && now.duration_since(**received_at) <= self.ack_timeout
            })
            .map(|((_, sender), _)| *sender)
            .collect();
        nodes.sort();
        nodes
    }

    /// Drop entries older than the acknowledgement timeout; returns how many
    /// were evicted
    pub fn purge_stale(&mut self) -> usize {
        let now = self.time_source.now();
        let timeout = self.ack_timeout;
        let before = self.entries.len();
        self.entries
            .retain(|_, received_at| now.duration_since(*received_at) <= timeout);
        before - self.entries.len()
    }

    /// Number of tracked entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MockTimeSource;

    fn tracker(timeout_secs: u64) -> (AckTracker<MockTimeSource>, MockTimeSource) {
        let time = MockTimeSource::new();
        time.set_time(1_000_000);
        (
            AckTracker::new(Duration::from_secs(timeout_secs), time.clone()),
            time,
        )
    }

    #[test]
    fn test_duplicate_acks_yield_one_entry() {
        let (mut tracker, _time) = tracker(60);
        let id = EmergencyId::generate();
        let sender = NodeId::new(7);
        tracker.register_session(id);

        for _ in 0..5 {
            assert!(tracker.record_ack(id, sender));
        }
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.confirmed_for(id), vec![sender]);
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let (mut tracker, _time) = tracker(60);
        let known = EmergencyId::generate();
        tracker.register_session(known);

        assert!(!tracker.record_ack(EmergencyId::generate(), NodeId::new(7)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_stale_entries_are_excluded_then_purged() {
        let (mut tracker, time) = tracker(60);
        let id = EmergencyId::generate();
        tracker.register_session(id);
        tracker.record_ack(id, NodeId::new(1));

        // One millisecond past the timeout: excluded from the confirmed set
        // even though housekeeping has not run yet
        time.advance(60 * 1000 + 1);
        assert!(tracker.confirmed_for(id).is_empty());
        assert_eq!(tracker.len(), 1);

        assert_eq!(tracker.purge_stale(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_refresh_resets_staleness() {
        let (mut tracker, time) = tracker(60);
        let id = EmergencyId::generate();
        let sender = NodeId::new(1);
        tracker.register_session(id);
        tracker.record_ack(id, sender);

        time.advance(50 * 1000);
        tracker.record_ack(id, sender); // latest receipt wins
        time.advance(50 * 1000);

        assert_eq!(tracker.confirmed_for(id), vec![sender]);
        assert_eq!(tracker.purge_stale(), 0);
    }

    #[test]
    fn test_old_and_new_ids_are_never_confused() {
        let (mut tracker, _time) = tracker(60);
        let old = EmergencyId::generate();
        let new = EmergencyId::generate();
        tracker.register_session(old);
        tracker.register_session(new);

        // A late ACK for the previous session is still accepted, under its
        // own id only
        assert!(tracker.record_ack(old, NodeId::new(1)));
        assert!(tracker.record_ack(new, NodeId::new(2)));
        assert_eq!(tracker.confirmed_for(old), vec![NodeId::new(1)]);
        assert_eq!(tracker.confirmed_for(new), vec![NodeId::new(2)]);
    }

    #[test]
    fn test_id_history_is_bounded() {
        let (mut tracker, _time) = tracker(60);
        let first = EmergencyId::generate();
        tracker.register_session(first);
        tracker.record_ack(first, NodeId::new(1));

        for _ in 0..RECENT_ID_CAPACITY {
            tracker.register_session(EmergencyId::generate());
        }

        assert!(!tracker.is_known(first));
        assert!(!tracker.record_ack(first, NodeId::new(2)));
        // Entries for the evicted id went with it
        assert!(tracker.confirmed_for(first).is_empty());
    }
}
