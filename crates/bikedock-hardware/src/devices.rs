//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT - Rust Edition 2024) are not
//! object-safe, so we cannot use `Box<dyn CardReader>`. The enums in this
//! module provide concrete type dispatch instead, keeping the futures
//! returned by the device methods nameable and `Send` for `tokio::spawn`.
//!
//! # Examples
//!
//! ```
//! use bikedock_hardware::devices::AnyCardReader;
//! use bikedock_hardware::mock::MockCardReader;
//!
//! let (reader, _handle) = MockCardReader::new();
//! let any_reader = AnyCardReader::Mock(reader);
//! ```

use crate::evdev::EvdevKeyboard;
use crate::mock::{MockBikeSensor, MockCardReader, MockOutputLine};
use crate::serial::SerialBikeSensor;
use crate::sysfs::SysfsGpioLine;
use crate::traits::{BikeFrame, BikeSensor, CardReader, KeyInput, OutputLine};
use crate::{DeviceInfo, Result};

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    /// Mock card reader for development and testing.
    Mock(MockCardReader),

    /// Keyboard-emulating reader on an evdev node.
    Evdev(EvdevKeyboard),
}

impl CardReader for AnyCardReader {
    async fn read_input(&mut self) -> Result<KeyInput> {
        match self {
            Self::Mock(device) => device.read_input().await,
            Self::Evdev(device) => device.read_input().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            Self::Evdev(device) => device.get_info().await,
        }
    }
}

/// Enum wrapper for bike sensor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyBikeSensor {
    /// Mock bike sensor for development and testing.
    Mock(MockBikeSensor),

    /// Line-framed tag reader on a serial port.
    Serial(SerialBikeSensor),
}

impl BikeSensor for AnyBikeSensor {
    async fn read_frame(&mut self) -> Result<BikeFrame> {
        match self {
            Self::Mock(device) => device.read_frame().await,
            Self::Serial(device) => device.read_frame().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            Self::Serial(device) => device.get_info().await,
        }
    }
}

/// Enum wrapper for output line dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyOutputLine {
    /// Mock line for development and testing.
    Mock(MockOutputLine),

    /// GPIO pin driven through sysfs.
    Sysfs(SysfsGpioLine),
}

impl OutputLine for AnyOutputLine {
    fn set_level(&mut self, on: bool) -> Result<()> {
        match self {
            Self::Mock(line) => line.set_level(on),
            Self::Sysfs(line) => line.set_level(on),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mock(line) => line.name(),
            Self::Sysfs(line) => line.name(),
        }
    }
}

impl From<MockCardReader> for AnyCardReader {
    fn from(device: MockCardReader) -> Self {
        Self::Mock(device)
    }
}

impl From<MockBikeSensor> for AnyBikeSensor {
    fn from(device: MockBikeSensor) -> Self {
        Self::Mock(device)
    }
}

impl From<MockOutputLine> for AnyOutputLine {
    fn from(line: MockOutputLine) -> Self {
        Self::Mock(line)
    }
}
