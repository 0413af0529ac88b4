//! Mock device implementations for testing and development.
//!
//! This module provides simulated device implementations that can be controlled
//! programmatically without requiring physical hardware.

pub mod bike_sensor;
pub mod card_reader;
pub mod output;

// Re-export commonly used types
pub use bike_sensor::{MockBikeSensor, MockBikeSensorHandle};
pub use card_reader::{MockCardReader, MockCardReaderHandle};
pub use output::{MockOutputHandle, MockOutputLine};
