//! Hardware device trait definitions.
//!
//! This module defines the contract between the dock controller and its
//! peripherals: the card reader, the bike-presence sensor and the output
//! lines behind every actuator channel. Mock and real implementations are
//! interchangeable behind these traits.
//!
//! Input devices use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). Output lines are synchronous: setting a GPIO level never waits.

#![allow(async_fn_in_trait)]

use crate::error::{HardwareError, Result};
use crate::types::DeviceInfo;

/// Input from the card reader.
///
/// Card readers on the dock present themselves as keyboards: a card swipe
/// types the card number followed by Enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Enter key, terminating a card code.
    Enter,

    /// Any other key, identified by its raw key code.
    Other(u16),
}

impl KeyInput {
    /// Create a digit input.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_hardware::traits::KeyInput;
    ///
    /// let input = KeyInput::digit(5).unwrap();
    /// assert_eq!(input.as_digit(), Some(5));
    ///
    /// assert!(KeyInput::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {}",
                d
            )));
        }
        Ok(Self::Digit(d))
    }

    /// Get the digit value if this is a digit input.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

/// Card reader abstraction.
///
/// Produces a stream of key inputs. Assembling them into card codes is the
/// job of the card poller, not of the device.
///
/// Like every input trait here, this trait is not object-safe; use the
/// enum wrapper [`AnyCardReader`](crate::devices::AnyCardReader) for
/// dynamic dispatch.
pub trait CardReader: Send + Sync {
    /// Read the next key input.
    ///
    /// Waits asynchronously until input is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or a read fails.
    async fn read_input(&mut self) -> Result<KeyInput>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Raw frame read from the bike-presence sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BikeFrame {
    /// Frame payload without the terminator.
    pub bytes: Vec<u8>,

    /// `false` when the stream ended before the frame terminator arrived.
    pub terminated: bool,
}

impl BikeFrame {
    /// Create a complete (terminated) frame.
    pub fn complete(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            terminated: true,
        }
    }

    /// Create a frame that was cut off before its terminator.
    pub fn truncated(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            terminated: false,
        }
    }
}

/// Bike-presence sensor abstraction.
///
/// The sensor reads the tag of a bike pushed into the dock and reports it
/// as one frame per detection.
pub trait BikeSensor: Send + Sync {
    /// Read the next frame from the sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or a read fails.
    async fn read_frame(&mut self) -> Result<BikeFrame>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// A single digital output line (status light or release actuator).
///
/// Owned exclusively by one actuator channel.
pub trait OutputLine: Send + 'static {
    /// Drive the line high (`true`) or low (`false`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying device rejects the write.
    fn set_level(&mut self, on: bool) -> Result<()>;

    /// Human-readable line name for logs.
    fn name(&self) -> &str;
}
