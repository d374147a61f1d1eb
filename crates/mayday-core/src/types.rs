//! Core types for the Mayday protocol
//!
//! This module defines the fundamental types used throughout the protocol,
//! using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Node Identifier
// ----------------------------------------------------------------------------

/// Unique identifier for a participant on the mesh (the radio's node number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new NodeId from a raw node number
    pub fn new(num: u32) -> Self {
        Self(num)
    }

    /// Get the raw node number
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical mesh node notation, e.g. "!0a1b2c3d"
        write!(f, "!{:08x}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = crate::MaydayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.strip_prefix('!').unwrap_or(s);
        u32::from_str_radix(clean, 16)
            .map(Self)
            .map_err(|_| crate::MaydayError::malformed("invalid hex in NodeId"))
    }
}

// ----------------------------------------------------------------------------
// Emergency Identifier
// ----------------------------------------------------------------------------

/// Opaque token identifying one broadcast episode, distinct across restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmergencyId(uuid::Uuid);

impl EmergencyId {
    /// Mint a fresh identifier for a new broadcast episode
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID (used when decoding packets)
    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EmergencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add seconds to this timestamp
    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0 + seconds * 1000)
    }

    /// Get duration since another timestamp (zero if `other` is newer)
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source
// ----------------------------------------------------------------------------

/// Trait for providing timestamps so staleness logic can be tested
/// deterministically
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Controllable time source for deterministic tests
#[derive(Debug, Clone, Default)]
pub struct MockTimeSource {
    millis: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute time in milliseconds
    pub fn set_time(&self, millis: u64) {
        self.millis
            .store(millis, std::sync::atomic::Ordering::SeqCst);
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        self.millis
            .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.millis.load(std::sync::atomic::Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display_and_parse() {
        let node = NodeId::new(0x0a1b2c3d);
        assert_eq!(node.to_string(), "!0a1b2c3d");
        assert_eq!("!0a1b2c3d".parse::<NodeId>().unwrap(), node);
        assert_eq!("0a1b2c3d".parse::<NodeId>().unwrap(), node);
        assert!("not-a-node".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_emergency_ids_are_unique() {
        assert_ne!(EmergencyId::generate(), EmergencyId::generate());
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t1 = Timestamp::new(1_000);
        let t2 = t1.add_seconds(5);
        assert_eq!(t2.as_millis(), 6_000);
        assert_eq!(t2.duration_since(t1).as_millis(), 5_000);
        // Saturates instead of underflowing
        assert_eq!(t1.duration_since(t2).as_millis(), 0);
    }

    #[test]
    fn test_mock_time_source() {
        let time = MockTimeSource::new();
        time.set_time(1_000);
        assert_eq!(time.now().as_millis(), 1_000);
        time.advance(500);
        assert_eq!(time.now().as_millis(), 1_500);

        // Clones observe the same clock
        let clone = time.clone();
        time.advance(500);
        assert_eq!(clone.now().as_millis(), 2_000);
    }
}
