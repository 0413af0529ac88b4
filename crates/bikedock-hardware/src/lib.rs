//! Hardware layer of the bike dock.
//!
//! This crate owns everything that touches a device: the card reader and
//! bike sensor behind their pollers, the output lines behind the actuator
//! channels, and the host identity used as the dock id. Mock devices stand
//! in for real ones in development and tests.
//!
//! # Design Philosophy
//!
//! - **Async-first**: input devices use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT), dispatched through enum wrappers.
//! - **Actors**: each actuator channel and each poller runs as its own task
//!   and is reachable only through a channel.
//! - **Cancellable**: every long-running task observes a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! # Input
//!
//! ```no_run
//! use bikedock_hardware::poller::CardCodeAssembler;
//! use bikedock_hardware::traits::CardReader;
//! use bikedock_hardware::Result;
//! use bikedock_core::CardCode;
//!
//! async fn next_card<R: CardReader>(reader: &mut R) -> Result<CardCode> {
//!     let mut assembler = CardCodeAssembler::new();
//!     loop {
//!         if let Some(code) = assembler.push(reader.read_input().await?) {
//!             return Ok(code);
//!         }
//!     }
//! }
//! ```
//!
//! # Output
//!
//! Status lights and the release actuator are driven through a
//! [`StatusPanel`]; see the [`actuator`] module for the countdown rules.

pub mod actuator;
pub mod devices;
pub mod error;
pub mod evdev;
pub mod identity;
pub mod manager;
pub mod mock;
pub mod panel;
pub mod poller;
pub mod serial;
pub mod sysfs;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use actuator::{ActuatorCommand, ActuatorConfig, ActuatorHandle};
pub use error::{HardwareError, Result};
pub use traits::{BikeFrame, BikeSensor, CardReader, KeyInput, OutputLine};
pub use types::{ChannelId, DeviceInfo};

// Re-export task managers
pub use manager::{SensorConfig, SensorHandle, SensorKind, SensorManager};
pub use panel::{ActuatorBank, ActuatorBankHandle, StatusPanel};
