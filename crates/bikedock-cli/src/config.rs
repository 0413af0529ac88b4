//! Dock configuration file.
//!
//! Every section is optional; a missing file or section means defaults.
//!
//! ```json
//! {
//!   "authority": { "base_url": "https://bikes.example.org/api", "timeout_ms": 5000 },
//!   "state": { "path": "/var/lib/bikedock/dock_state" },
//!   "pins": { "lock": 20 }
//! }
//! ```

use anyhow::{Context, Result};
use bikedock_controller::ControllerConfig;
use bikedock_hardware::sysfs::DEFAULT_GPIO_ROOT;
use bikedock_hardware::{ActuatorConfig, ChannelId, SensorConfig};
use bikedock_network::AuthorityConfig;
use bikedock_storage::StateStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// BCM pin assignment of the output lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// sysfs GPIO class directory
    pub gpio_root: String,
    pub green: u32,
    pub amber: u32,
    pub amber2: u32,
    pub red: u32,
    pub lock: u32,
    pub occupancy: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            gpio_root: DEFAULT_GPIO_ROOT.to_string(),
            green: 19,
            amber: 26,
            amber2: 6,
            red: 13,
            lock: 21,
            occupancy: 5,
        }
    }
}

impl PinConfig {
    /// Pin driving `channel`.
    pub fn pin(&self, channel: ChannelId) -> u32 {
        match channel {
            ChannelId::Green => self.green,
            ChannelId::Amber => self.amber,
            ChannelId::Amber2 => self.amber2,
            ChannelId::Red => self.red,
            ChannelId::Lock => self.lock,
            ChannelId::Occupancy => self.occupancy,
        }
    }
}

/// Complete dock configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Fixed dock id; derived from the hardware when absent
    pub dock_id: Option<String>,
    pub authority: AuthorityConfig,
    pub actuators: ActuatorConfig,
    pub sensors: SensorConfig,
    pub state: StateStoreConfig,
    pub pins: PinConfig,
    pub controller: ControllerConfig,
}

impl DockConfig {
    /// Load the configuration from `path`, falling back to defaults if the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DockConfig::load(&dir.path().join("bikedock.json")).unwrap();
        assert_eq!(config, DockConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bikedock.json");
        std::fs::write(
            &path,
            r#"{
                "dock_id": "dock-7",
                "authority": { "base_url": "https://bikes.example.org/api" },
                "pins": { "lock": 20 }
            }"#,
        )
        .unwrap();

        let config = DockConfig::load(&path).unwrap();
        assert_eq!(config.dock_id.as_deref(), Some("dock-7"));
        assert_eq!(config.authority.base_url, "https://bikes.example.org/api");
        assert_eq!(config.authority.timeout_ms, 10_000);
        assert_eq!(config.pins.pin(ChannelId::Lock), 20);
        assert_eq!(config.pins.pin(ChannelId::Green), 19);
        assert_eq!(config.controller, ControllerConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bikedock.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = DockConfig::load(&path).unwrap_err();
        assert!(err.to_string().starts_with("parsing"));
    }

    #[test]
    fn test_default_pins_are_distinct() {
        let pins = PinConfig::default();
        let mut used: Vec<u32> = ChannelId::ALL.iter().map(|c| pins.pin(*c)).collect();
        used.sort_unstable();
        used.dedup();
        assert_eq!(used.len(), ChannelId::ALL.len());
    }
}
