//! Card reader backed by a Linux evdev keyboard device.
//!
//! USB card readers enumerate as keyboards and "type" the card number
//! followed by Enter. This module decodes raw `struct input_event` records
//! from `/dev/input/eventN` into [`KeyInput`] values.

use crate::{
    HardwareError, Result,
    traits::{CardReader, KeyInput},
    types::DeviceInfo,
};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Size of one `struct input_event`: a `timeval` (two C longs) followed by
/// `u16 type`, `u16 code` and `i32 value`.
pub const INPUT_EVENT_SIZE: usize = 2 * std::mem::size_of::<usize>() + 8;

const EV_KEY: u16 = 0x01;
const KEY_DOWN: i32 = 1;

const KEY_ENTER: u16 = 28;
const KEY_KPENTER: u16 = 96;

/// Map a Linux key code to a card reader input.
///
/// Both the top-row digits and the numeric keypad are recognised.
pub fn key_code_to_input(code: u16) -> KeyInput {
    match code {
        // KEY_1..KEY_9
        2..=10 => KeyInput::Digit((code - 1) as u8),
        // KEY_0
        11 => KeyInput::Digit(0),
        KEY_ENTER | KEY_KPENTER => KeyInput::Enter,
        // keypad, laid out as on the keyboard
        71 => KeyInput::Digit(7),
        72 => KeyInput::Digit(8),
        73 => KeyInput::Digit(9),
        75 => KeyInput::Digit(4),
        76 => KeyInput::Digit(5),
        77 => KeyInput::Digit(6),
        79 => KeyInput::Digit(1),
        80 => KeyInput::Digit(2),
        81 => KeyInput::Digit(3),
        82 => KeyInput::Digit(0),
        other => KeyInput::Other(other),
    }
}

/// Decode one raw `input_event` record.
///
/// Returns `None` for anything other than a key-down event (sync reports,
/// key releases, auto-repeat).
pub fn decode_input_event(record: &[u8]) -> Option<KeyInput> {
    if record.len() != INPUT_EVENT_SIZE {
        return None;
    }

    let body = &record[INPUT_EVENT_SIZE - 8..];
    let ev_type = u16::from_ne_bytes([body[0], body[1]]);
    let code = u16::from_ne_bytes([body[2], body[3]]);
    let value = i32::from_ne_bytes([body[4], body[5], body[6], body[7]]);

    if ev_type != EV_KEY || value != KEY_DOWN {
        return None;
    }

    Some(key_code_to_input(code))
}

/// Card reader reading key events from an evdev device node.
#[derive(Debug)]
pub struct EvdevKeyboard {
    file: File,
    path: String,
}

impl EvdevKeyboard {
    /// Open the event device at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device node cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| {
            HardwareError::initialization_failed(format!("{}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "Opened evdev card reader");

        Ok(Self {
            file,
            path: path.display().to_string(),
        })
    }
}

impl CardReader for EvdevKeyboard {
    async fn read_input(&mut self) -> Result<KeyInput> {
        let mut record = [0u8; INPUT_EVENT_SIZE];
        loop {
            match self.file.read_exact(&mut record).await {
                Ok(_) => {
                    if let Some(input) = decode_input_event(&record) {
                        return Ok(input);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(HardwareError::disconnected(self.path.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("Evdev Card Reader", "USB HID keyboard").with_path(self.path.clone()))
    }
}
