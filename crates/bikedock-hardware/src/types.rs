//! Common types shared across hardware device implementations.
//!
//! This module defines types used by multiple device traits, such as
//! device information and the identifiers of the dock's output channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
///
/// Contains metadata about a hardware device such as name, model
/// and the path it was opened from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "Mock Card Reader", "/dev/ttyUSB0").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional device path on the host.
    pub path: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            path: None,
        }
    }

    /// Set the device path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Identifier of an independently scheduled output channel.
///
/// The dock has four feedback lights at distinct positions, one release
/// actuator and a steady occupancy light. Every channel is driven by its own
/// countdown loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Green light: request accepted.
    Green,

    /// Amber light: card presented with no bike docked.
    Amber,

    /// Second amber light: bike presented while the dock is occupied.
    #[serde(rename = "amber2")]
    Amber2,

    /// Red light: request denied by the authority.
    Red,

    /// Release mechanism holding the docked bike.
    Lock,

    /// Steady light showing that a bike is docked.
    Occupancy,
}

impl ChannelId {
    /// All channels, in wiring order.
    pub const ALL: [ChannelId; 6] = [
        ChannelId::Green,
        ChannelId::Amber,
        ChannelId::Amber2,
        ChannelId::Red,
        ChannelId::Lock,
        ChannelId::Occupancy,
    ];

    /// Stable lowercase name used in logs and configuration.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelId::Green => "green",
            ChannelId::Amber => "amber",
            ChannelId::Amber2 => "amber2",
            ChannelId::Red => "red",
            ChannelId::Lock => "lock",
            ChannelId::Occupancy => "occupancy",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
