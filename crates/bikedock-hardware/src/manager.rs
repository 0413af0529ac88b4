//! Sensor manager.
//!
//! This module provides the `SensorManager`, which runs the card and bike
//! pollers and feeds their events into the controller's event queue.
//!
//! # Architecture
//!
//! Each sensor runs in its own task. Pollers turn raw device input into
//! [`DockEvent`]s and are the only producers of the queue; the controller is
//! its only consumer.
//!
//! ```text
//! ┌─────────────┐       ┌─────────────────┐
//! │ Card        │──────►│                 │
//! │ Poller      │       │  Event Queue    │
//! └─────────────┘       │  (mpsc)         │──────► Dock Controller
//!                       │                 │
//! ┌─────────────┐       │                 │
//! │ Bike        │──────►│                 │
//! │ Poller      │       └─────────────────┘
//! └─────────────┘
//! ```
//!
//! A poller whose device fails logs the error and stops. It is not
//! restarted.
//!
//! # Examples
//!
//! ```no_run
//! use bikedock_hardware::manager::{SensorConfig, SensorManager};
//! use bikedock_hardware::devices::AnyCardReader;
//! use bikedock_hardware::mock::MockCardReader;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> bikedock_hardware::Result<()> {
//!     let (events_tx, mut events_rx) = mpsc::channel(32);
//!     let mut manager = SensorManager::new(events_tx, SensorConfig::default());
//!
//!     let (reader, _handle) = MockCardReader::new();
//!     manager.register_card_reader(AnyCardReader::Mock(reader));
//!
//!     let handle = manager.start(CancellationToken::new());
//!
//!     while let Some(event) = events_rx.recv().await {
//!         println!("Event: {event}");
//!     }
//!
//!     handle.shutdown().await
//! }
//! ```

use crate::devices::{AnyBikeSensor, AnyCardReader};
use crate::poller::{CardCodeAssembler, frame_to_bike_id};
use crate::traits::{BikeSensor, CardReader};
use crate::Result;
use bikedock_core::DockEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Kind of sensor behind a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    CardReader,
    BikeSensor,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CardReader => write!(f, "card reader"),
            Self::BikeSensor => write!(f, "bike sensor"),
        }
    }
}

/// Sensor configuration.
///
/// Controls which sensors are started and where the real devices live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Start the card poller.
    pub card_reader_enabled: bool,

    /// Start the bike poller.
    pub bike_sensor_enabled: bool,

    /// evdev node of the card reader.
    pub card_reader_path: String,

    /// Serial port of the bike tag reader.
    pub bike_sensor_path: String,

    /// Baud rate of the bike tag reader.
    pub bike_sensor_baud: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            card_reader_enabled: true,
            bike_sensor_enabled: true,
            card_reader_path: "/dev/input/event0".to_string(),
            bike_sensor_path: "/dev/ttyUSB0".to_string(),
            bike_sensor_baud: 9600,
        }
    }
}

/// Running sensor pollers.
#[derive(Debug)]
pub struct SensorHandle {
    cancel: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl SensorHandle {
    /// Number of pollers still registered with the handle.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no poller is running.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every poller and wait for it to finish.
    ///
    /// Poller failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` keeps room for shutdown errors.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        drain_tasks(&mut self.tasks, "sensor").await;
        Ok(())
    }
}

/// Wait for every task in `tasks` and log how each one ended.
pub(crate) async fn drain_tasks(tasks: &mut JoinSet<Result<()>>, group: &str) {
    let mut error_count = 0;
    let mut panic_count = 0;

    while let Some(result) = tasks.join_next().await {
        match classify_task_result(result) {
            TaskTermination::Success | TaskTermination::Cancelled => {}
            TaskTermination::Error(e) => {
                warn!(group, error = %e, "Task ended with error");
                error_count += 1;
            }
            TaskTermination::Panic => panic_count += 1,
        }
    }

    if error_count + panic_count > 0 {
        warn!(group, error_count, panic_count, "Tasks stopped abnormally");
    } else {
        debug!(group, "All tasks stopped");
    }
}

/// Classify the termination status of a task.
fn classify_task_result(
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> TaskTermination {
    match result {
        Ok(Ok(())) => TaskTermination::Success,
        Ok(Err(e)) => TaskTermination::Error(e),
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}

/// Task termination classification for shutdown handling.
#[derive(Debug)]
enum TaskTermination {
    /// Task completed successfully.
    Success,
    /// Task returned an error.
    Error(crate::HardwareError),
    /// Task was cancelled (expected during shutdown).
    Cancelled,
    /// Task panicked.
    Panic,
}

/// Runs the sensor pollers.
///
/// # Lifecycle
///
/// 1. Create manager with the event queue sender and configuration
/// 2. Register devices using `register_*` methods
/// 3. Call `start()` to spawn poller tasks
/// 4. Cancel the token (or call `shutdown()`) to stop them
#[derive(Debug)]
pub struct SensorManager {
    config: SensorConfig,
    events_tx: mpsc::Sender<DockEvent>,
    card_reader: Option<AnyCardReader>,
    bike_sensor: Option<AnyBikeSensor>,
}

impl SensorManager {
    /// Create a manager that forwards events to `events_tx`.
    pub fn new(events_tx: mpsc::Sender<DockEvent>, config: SensorConfig) -> Self {
        Self {
            config,
            events_tx,
            card_reader: None,
            bike_sensor: None,
        }
    }

    /// Register the card reader, replacing any earlier one.
    pub fn register_card_reader(&mut self, device: AnyCardReader) {
        self.card_reader = Some(device);
    }

    /// Register the bike sensor, replacing any earlier one.
    pub fn register_bike_sensor(&mut self, device: AnyBikeSensor) {
        self.bike_sensor = Some(device);
    }

    /// Check if a sensor kind is enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_hardware::manager::{SensorConfig, SensorKind, SensorManager};
    /// use tokio::sync::mpsc;
    ///
    /// let (tx, _rx) = mpsc::channel(1);
    /// let config = SensorConfig {
    ///     bike_sensor_enabled: false,
    ///     ..SensorConfig::default()
    /// };
    /// let manager = SensorManager::new(tx, config);
    ///
    /// assert!(manager.is_enabled(SensorKind::CardReader));
    /// assert!(!manager.is_enabled(SensorKind::BikeSensor));
    /// ```
    pub fn is_enabled(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::CardReader => self.config.card_reader_enabled,
            SensorKind::BikeSensor => self.config.bike_sensor_enabled,
        }
    }

    /// Spawn the registered and enabled pollers.
    ///
    /// Pollers stop when `cancel` fires or the event queue closes.
    pub fn start(mut self, cancel: CancellationToken) -> SensorHandle {
        let mut tasks = JoinSet::new();

        if self.config.card_reader_enabled
            && let Some(device) = self.card_reader.take()
        {
            tasks.spawn(card_task(device, self.events_tx.clone(), cancel.clone()));
        }

        if self.config.bike_sensor_enabled
            && let Some(device) = self.bike_sensor.take()
        {
            tasks.spawn(bike_task(device, self.events_tx.clone(), cancel.clone()));
        }

        info!(pollers = tasks.len(), "Sensor pollers started");

        SensorHandle { cancel, tasks }
    }
}

async fn card_task(
    mut device: AnyCardReader,
    tx: mpsc::Sender<DockEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut assembler = CardCodeAssembler::new();

    loop {
        let input = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            input = device.read_input() => input,
        };

        let input = match input {
            Ok(input) => input,
            Err(e) => {
                error!(
                    sensor = %SensorKind::CardReader,
                    error = %e,
                    "Sensor failed, poller stopping"
                );
                return Err(e);
            }
        };

        if let Some(code) = assembler.push(input) {
            debug!(digits = code.as_str().len(), "Card scanned");
            if !emit(&tx, &cancel, DockEvent::CardScanned(code)).await {
                return Ok(());
            }
        }
    }
}

async fn bike_task(
    mut device: AnyBikeSensor,
    tx: mpsc::Sender<DockEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            frame = device.read_frame() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    sensor = %SensorKind::BikeSensor,
                    error = %e,
                    "Sensor failed, poller stopping"
                );
                return Err(e);
            }
        };

        if let Some(bike_id) = frame_to_bike_id(&frame) {
            debug!(bike_id = %bike_id, "Bike detected");
            if !emit(&tx, &cancel, DockEvent::BikeDetected(bike_id)).await {
                return Ok(());
            }
        }
    }
}

/// Push an event into the queue; `false` once the poller should stop.
async fn emit(tx: &mpsc::Sender<DockEvent>, cancel: &CancellationToken, event: DockEvent) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBikeSensor, MockCardReader};
    use crate::traits::BikeFrame;
    use bikedock_core::{BikeId, CardCode};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    #[test]
    fn test_sensor_config_default() {
        let config = SensorConfig::default();
        assert!(config.card_reader_enabled);
        assert!(config.bike_sensor_enabled);
        assert_eq!(config.card_reader_path, "/dev/input/event0");
    }

    #[test]
    fn test_sensor_config_partial_json() {
        let config: SensorConfig =
            serde_json::from_str(r#"{"bike_sensor_path": "/dev/ttyAMA0"}"#).unwrap();
        assert_eq!(config.bike_sensor_path, "/dev/ttyAMA0");
        assert_eq!(config.bike_sensor_baud, 9600);
    }

    #[test]
    fn test_sensor_kind_display() {
        assert_eq!(SensorKind::CardReader.to_string(), "card reader");
        assert_eq!(SensorKind::BikeSensor.to_string(), "bike sensor");
    }

    #[tokio::test]
    async fn test_card_poller_emits_card_scanned() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = SensorManager::new(tx, SensorConfig::default());
        let (reader, reader_handle) = MockCardReader::new();
        manager.register_card_reader(reader.into());

        let handle = manager.start(CancellationToken::new());
        reader_handle.send_card(&[4, 2]).await.unwrap();

        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, DockEvent::CardScanned(CardCode::new("42").unwrap()));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bike_poller_discards_malformed_frames() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = SensorManager::new(tx, SensorConfig::default());
        let (sensor, sensor_handle) = MockBikeSensor::new();
        manager.register_bike_sensor(sensor.into());

        let handle = manager.start(CancellationToken::new());
        sensor_handle
            .send_frame(BikeFrame::truncated(&b"BIK"[..]))
            .await
            .unwrap();
        sensor_handle
            .send_frame(BikeFrame::complete(&b"\r"[..]))
            .await
            .unwrap();
        sensor_handle.dock_bike("BIKE123").await.unwrap();

        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(
            event,
            DockEvent::BikeDetected(BikeId::new("BIKE123").unwrap())
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_sensor_not_started() {
        let (tx, _rx) = mpsc::channel(8);
        let config = SensorConfig {
            card_reader_enabled: false,
            ..SensorConfig::default()
        };
        let mut manager = SensorManager::new(tx, config);
        let (reader, _reader_handle) = MockCardReader::new();
        manager.register_card_reader(reader.into());

        let handle = manager.start(CancellationToken::new());
        assert!(handle.is_empty());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_poller_stops_when_device_disconnects() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = SensorManager::new(tx, SensorConfig::default());
        let (sensor, sensor_handle) = MockBikeSensor::new();
        manager.register_bike_sensor(sensor.into());

        let handle = manager.start(CancellationToken::new());
        drop(sensor_handle);

        // the only sender left is inside the manager, which was consumed
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_pollers() {
        let (tx, _rx) = mpsc::channel(8);
        let mut manager = SensorManager::new(tx, SensorConfig::default());
        let (reader, _reader_handle) = MockCardReader::new();
        let (sensor, _sensor_handle) = MockBikeSensor::new();
        manager.register_card_reader(reader.into());
        manager.register_bike_sensor(sensor.into());

        let cancel = CancellationToken::new();
        let handle = manager.start(cancel.clone());
        assert_eq!(handle.len(), 2);

        cancel.cancel();
        timeout(WAIT, handle.shutdown()).await.unwrap().unwrap();
    }
}
