//! Configuration for the Mayday engine
//!
//! The engine reads its configuration once at startup. A missing config file
//! is seeded with defaults and startup proceeds; a present but invalid file
//! is fatal to startup (and only to startup; nothing here can take down a
//! running engine).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{MaydayError, Result};

/// Highest port number participants may share (the radio's application range)
pub const MAX_PORT: u16 = 511;

// ----------------------------------------------------------------------------
// Engine Configuration
// ----------------------------------------------------------------------------

/// Configuration surface of the engine, read-only once loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaydayConfig {
    /// Broadcast cadence in seconds (> 0)
    pub interval_secs: u64,
    /// Numeric channel shared by every participant (0–511)
    pub port: u16,
    /// Message text used when `start` is issued without one (non-empty)
    pub default_message: String,
    /// Proximity alert radius in meters (0 disables the monitor)
    pub alert_radius_m: u32,
    /// Seconds before an acknowledgement is considered stale (> 0)
    pub ack_timeout_secs: u64,
    /// Start broadcasting with the default message as soon as the engine is up
    pub auto_start: bool,
    /// Optional path for the append-only received-event log
    pub event_log: Option<PathBuf>,
}

impl Default for MaydayConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            port: 256,
            default_message: "SOS! Emergency situation detected.".into(),
            alert_radius_m: 1000,
            ack_timeout_secs: 300,
            auto_start: false,
            event_log: None,
        }
    }
}

impl MaydayConfig {
    /// Create configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing (short cadences)
    pub fn testing() -> Self {
        Self {
            interval_secs: 1,
            port: 256,
            default_message: "test emergency".into(),
            alert_radius_m: 500,
            ack_timeout_secs: 5,
            auto_start: false,
            event_log: None,
        }
    }

    /// Validate the configuration; errors here are fatal to startup
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(MaydayError::config_error(
                "interval_secs must be a positive integer",
            ));
        }
        if self.port > MAX_PORT {
            return Err(MaydayError::config_error(format!(
                "port must be between 0 and {MAX_PORT} (inclusive)"
            )));
        }
        if self.default_message.is_empty() {
            return Err(MaydayError::config_error(
                "default_message cannot be empty",
            ));
        }
        if self.ack_timeout_secs == 0 {
            return Err(MaydayError::config_error(
                "ack_timeout_secs must be a positive integer",
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON file, creating the file with defaults
    /// if it does not exist yet
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("configuration file not found, creating {} with defaults", path.display());
            let config = Self::default();
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            let body = serde_json::to_string_pretty(&config)
                .map_err(|e| MaydayError::config_error(e.to_string()))?;
            std::fs::write(path, body)?;
            return Ok(config);
        }

        let body = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&body).map_err(|e| {
            MaydayError::config_error(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    // ------------------------------------------------------------------------
    // Derived durations
    // ------------------------------------------------------------------------

    /// Broadcast cadence
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Staleness threshold for acknowledgements
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// Retention window for incoming alerts still marked active
    pub fn alert_retention(&self) -> Duration {
        Duration::from_secs((self.ack_timeout_secs * 3).max(600))
    }

    /// Grace window for incoming alerts their originator already cleared
    pub fn cleared_grace(&self) -> Duration {
        self.ack_timeout()
    }

    /// Cadence of the housekeeping sweep, independent of the broadcast cadence
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs((self.ack_timeout_secs / 2).max(30))
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the channels between tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for command channels (shell → engine)
    pub command_buffer_size: usize,
    /// Buffer size for event channels (transport → engine)
    pub event_buffer_size: usize,
    /// Buffer size for effect channels (engine → transport)
    pub effect_buffer_size: usize,
    /// Buffer size for app-event channels (engine → shell)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // commands are infrequent
            event_buffer_size: 128,    // inbound packets can be bursty
            effect_buffer_size: 64,    // effects are executed quickly
            app_event_buffer_size: 64, // shell notifications
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MaydayConfig::default().validate().is_ok());
        assert!(MaydayConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut config = MaydayConfig::default();
        config.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MaydayConfig::default();
        config.port = MAX_PORT + 1;
        assert!(config.validate().is_err());

        let mut config = MaydayConfig::default();
        config.default_message = String::new();
        assert!(config.validate().is_err());

        let mut config = MaydayConfig::default();
        config.ack_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: MaydayConfig = serde_json::from_str(r#"{"port": 300}"#).unwrap();
        assert_eq!(config.port, 300);
        assert_eq!(config.interval_secs, MaydayConfig::default().interval_secs);
    }

    #[test]
    fn test_derived_durations() {
        let config = MaydayConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(60));
        // 3 × 300 s ack timeout, already above the 600 s floor
        assert_eq!(config.alert_retention(), Duration::from_secs(900));
        assert_eq!(config.sweep_interval(), Duration::from_secs(150));

        let config = MaydayConfig::testing();
        // Short ack timeout hits both floors
        assert_eq!(config.alert_retention(), Duration::from_secs(600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_or_init_seeds_missing_file() {
        let dir = std::env::temp_dir().join(format!("mayday-config-{}", std::process::id()));
        let path = dir.join("mayday.json");
        let _ = std::fs::remove_dir_all(&dir);

        let config = MaydayConfig::load_or_init(&path).unwrap();
        assert_eq!(config.port, MaydayConfig::default().port);
        assert!(path.exists());

        // Second load reads the seeded file back
        let reloaded = MaydayConfig::load_or_init(&path).unwrap();
        assert_eq!(reloaded.port, config.port);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join(format!("mayday-badconfig-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mayday.json");

        std::fs::write(&path, r#"{"interval_secs": 0}"#).unwrap();
        assert!(MaydayConfig::load_or_init(&path).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(MaydayConfig::load_or_init(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
