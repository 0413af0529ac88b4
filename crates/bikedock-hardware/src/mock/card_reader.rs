//! Mock card reader implementation for testing and development.
//!
//! This module provides a simulated card reader that can be controlled
//! programmatically for testing without requiring physical hardware.

use crate::{
    HardwareError, Result,
    traits::{CardReader, KeyInput},
    types::DeviceInfo,
};
use tokio::sync::mpsc;

/// Mock card reader for testing and development.
///
/// The reader yields whatever key inputs are pushed through its
/// [`MockCardReaderHandle`].
///
/// # Examples
///
/// ```
/// use bikedock_hardware::mock::MockCardReader;
/// use bikedock_hardware::traits::{CardReader, KeyInput};
///
/// #[tokio::main]
/// async fn main() -> bikedock_hardware::Result<()> {
///     let (mut reader, handle) = MockCardReader::new();
///
///     handle.send_card(&[4, 2]).await?;
///
///     assert_eq!(reader.read_input().await?, KeyInput::Digit(4));
///     assert_eq!(reader.read_input().await?, KeyInput::Digit(2));
///     assert_eq!(reader.read_input().await?, KeyInput::Enter);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    /// Channel receiver for simulated input
    input_rx: mpsc::Receiver<KeyInput>,

    /// Device name
    name: String,
}

impl MockCardReader {
    /// Create a new mock card reader with the default name.
    ///
    /// Returns a tuple of (MockCardReader, MockCardReaderHandle) where the
    /// handle simulates swipes.
    pub fn new() -> (Self, MockCardReaderHandle) {
        Self::with_name("Mock Card Reader".to_string())
    }

    /// Create a new mock card reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockCardReaderHandle) {
        let (input_tx, input_rx) = mpsc::channel(64);

        let reader = Self {
            input_rx,
            name: name.clone(),
        };

        let handle = MockCardReaderHandle { input_tx, name };

        (reader, handle)
    }
}

impl CardReader for MockCardReader {
    async fn read_input(&mut self) -> Result<KeyInput> {
        self.input_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Card reader input channel closed"))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Card Reader v1.0"))
    }
}

/// Handle for controlling a mock card reader.
///
/// It can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockCardReaderHandle {
    /// Channel sender for simulated input
    input_tx: mpsc::Sender<KeyInput>,

    /// Device name
    name: String,
}

impl MockCardReaderHandle {
    /// Send a single key input to the mock reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped and the channel is closed.
    pub async fn send_input(&self, input: KeyInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| HardwareError::disconnected("Card reader input channel closed"))
    }

    /// Send a sequence of digit inputs without a terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if any digit is greater than 9 or the channel is closed.
    pub async fn send_digits(&self, digits: &[u8]) -> Result<()> {
        for &digit in digits {
            self.send_input(KeyInput::digit(digit)?).await?;
        }
        Ok(())
    }

    /// Simulate a complete card swipe: the digits followed by Enter.
    ///
    /// # Errors
    ///
    /// Returns an error if any digit is greater than 9 or the channel is closed.
    pub async fn send_card(&self, digits: &[u8]) -> Result<()> {
        self.send_digits(digits).await?;
        self.send_input(KeyInput::Enter).await
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
