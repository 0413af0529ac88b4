//! Bike sensor reading newline-terminated tag frames from a byte stream.
//!
//! The tag reader under the dock writes one line per detected bike. Reading
//! is blocking, so a dedicated thread pumps frames into a channel that the
//! async [`BikeSensor`] side drains.

use crate::{
    HardwareError, Result,
    traits::{BikeFrame, BikeSensor},
    types::DeviceInfo,
};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const FRAME_TERMINATOR: u8 = b'\n';

/// Bike sensor backed by a serial line (or any blocking byte stream).
#[derive(Debug)]
pub struct SerialBikeSensor {
    frame_rx: mpsc::Receiver<BikeFrame>,
    name: String,
}

impl SerialBikeSensor {
    /// Open a serial port and start reading frames from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened.
    #[cfg(feature = "hardware-serial")]
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(std::time::Duration::from_millis(500))
            .open()
            .map_err(|e| HardwareError::initialization_failed(format!("{path}: {e}")))?;

        Self::from_reader(port, path)
    }

    /// Start reading frames from an arbitrary blocking reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader thread cannot be spawned.
    pub fn from_reader<R>(reader: R, name: impl Into<String>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (frame_tx, frame_rx) = mpsc::channel(16);

        let thread_name = name.clone();
        std::thread::Builder::new()
            .name("bike-sensor".to_string())
            .spawn(move || pump_frames(BufReader::new(reader), frame_tx, &thread_name))?;

        Ok(Self { frame_rx, name })
    }
}

/// Read frames until end of stream or a fatal error.
///
/// Read timeouts are not fatal: bytes read so far stay in the buffer and the
/// frame continues on the next read.
fn pump_frames<R: BufRead>(mut reader: R, frame_tx: mpsc::Sender<BikeFrame>, name: &str) {
    let mut buf = Vec::new();
    loop {
        let frame = match reader.read_until(FRAME_TERMINATOR, &mut buf) {
            Ok(0) => {
                if !buf.is_empty()
                    && frame_tx
                        .blocking_send(BikeFrame::truncated(std::mem::take(&mut buf)))
                        .is_err()
                {
                    debug!(device = name, "Bike sensor receiver gone, dropping last frame");
                }
                debug!(device = name, "Bike sensor stream ended");
                return;
            }
            Ok(_) if buf.last() == Some(&FRAME_TERMINATOR) => {
                buf.pop();
                BikeFrame::complete(std::mem::take(&mut buf))
            }
            // end of stream without terminator; the next read reports it
            Ok(_) => continue,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => continue,
            Err(e) => {
                warn!(device = name, error = %e, "Bike sensor read failed");
                return;
            }
        };

        if frame_tx.blocking_send(frame).is_err() {
            debug!(device = name, "Bike sensor receiver gone, stopping reader");
            return;
        }
    }
}

impl BikeSensor for SerialBikeSensor {
    async fn read_frame(&mut self) -> Result<BikeFrame> {
        self.frame_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected(self.name.clone()))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("Serial Bike Sensor", "line-framed tag reader")
            .with_path(self.name.clone()))
    }
}
