//! Mock bike-presence sensor for testing and development.

use crate::{
    HardwareError, Result,
    traits::{BikeFrame, BikeSensor},
    types::DeviceInfo,
};
use tokio::sync::mpsc;

/// Mock bike sensor.
///
/// Frames pushed through the [`MockBikeSensorHandle`] are returned by
/// [`read_frame`](BikeSensor::read_frame) in order.
///
/// # Examples
///
/// ```
/// use bikedock_hardware::mock::MockBikeSensor;
/// use bikedock_hardware::traits::BikeSensor;
///
/// #[tokio::main]
/// async fn main() -> bikedock_hardware::Result<()> {
///     let (mut sensor, handle) = MockBikeSensor::new();
///
///     handle.dock_bike("BIKE123").await?;
///
///     let frame = sensor.read_frame().await?;
///     assert_eq!(frame.bytes, b"BIKE123");
///     assert!(frame.terminated);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockBikeSensor {
    frame_rx: mpsc::Receiver<BikeFrame>,
    name: String,
}

impl MockBikeSensor {
    /// Create a new mock bike sensor and its control handle.
    pub fn new() -> (Self, MockBikeSensorHandle) {
        Self::with_name("Mock Bike Sensor".to_string())
    }

    /// Create a new mock bike sensor with a custom name.
    pub fn with_name(name: String) -> (Self, MockBikeSensorHandle) {
        let (frame_tx, frame_rx) = mpsc::channel(32);
        (
            Self {
                frame_rx,
                name: name.clone(),
            },
            MockBikeSensorHandle { frame_tx, name },
        )
    }
}

impl BikeSensor for MockBikeSensor {
    async fn read_frame(&mut self) -> Result<BikeFrame> {
        self.frame_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Bike sensor frame channel closed"))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Bike Sensor v1.0"))
    }
}

/// Handle for controlling a mock bike sensor.
#[derive(Debug, Clone)]
pub struct MockBikeSensorHandle {
    frame_tx: mpsc::Sender<BikeFrame>,
    name: String,
}

impl MockBikeSensorHandle {
    /// Push a raw frame to the sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor has been dropped.
    pub async fn send_frame(&self, frame: BikeFrame) -> Result<()> {
        self.frame_tx
            .send(frame)
            .await
            .map_err(|_| HardwareError::disconnected("Bike sensor frame channel closed"))
    }

    /// Simulate a bike being pushed into the dock.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor has been dropped.
    pub async fn dock_bike(&self, tag: &str) -> Result<()> {
        self.send_frame(BikeFrame::complete(tag.as_bytes())).await
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
