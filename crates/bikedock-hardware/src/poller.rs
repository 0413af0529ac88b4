//! Turning raw sensor input into dock events.
//!
//! Both pollers discard malformed input without emitting anything: the
//! controller only ever sees well-formed `CardScanned` / `BikeDetected`
//! events.

use crate::traits::{BikeFrame, KeyInput};
use bikedock_core::{BikeId, CardCode, constants::MAX_CARD_CODE_LENGTH};
use tracing::debug;

/// Accumulates card reader key presses into card codes.
///
/// Digits are buffered until Enter. Enter with an empty or oversized buffer
/// emits nothing; keys that are neither digits nor Enter are ignored.
///
/// # Examples
///
/// ```
/// use bikedock_hardware::poller::CardCodeAssembler;
/// use bikedock_hardware::traits::KeyInput;
///
/// let mut assembler = CardCodeAssembler::new();
/// assert!(assembler.push(KeyInput::Digit(4)).is_none());
/// assert!(assembler.push(KeyInput::Digit(2)).is_none());
/// let code = assembler.push(KeyInput::Enter).unwrap();
/// assert_eq!(code.as_str(), "42");
/// ```
#[derive(Debug, Default)]
pub struct CardCodeAssembler {
    digits: Vec<u8>,
    overflowed: bool,
}

impl CardCodeAssembler {
    /// Create an assembler with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one key input; returns a card code when one is complete.
    pub fn push(&mut self, input: KeyInput) -> Option<CardCode> {
        match input {
            KeyInput::Digit(d) if d <= 9 => {
                if self.digits.len() >= MAX_CARD_CODE_LENGTH {
                    self.overflowed = true;
                } else {
                    self.digits.push(d);
                }
                None
            }
            KeyInput::Enter => self.finish(),
            other => {
                debug!(input = ?other, "Ignoring card reader input");
                None
            }
        }
    }

    /// Number of digits buffered so far.
    pub fn pending(&self) -> usize {
        self.digits.len()
    }

    fn finish(&mut self) -> Option<CardCode> {
        let digits = std::mem::take(&mut self.digits);
        let overflowed = std::mem::replace(&mut self.overflowed, false);

        if overflowed {
            debug!("Discarding oversized card code");
            return None;
        }

        match CardCode::from_digits(&digits) {
            Ok(code) => Some(code),
            Err(e) => {
                debug!(error = %e, "Discarding card input");
                None
            }
        }
    }
}

/// Convert a sensor frame into a bike id.
///
/// Non-printable bytes (framing characters, CR) are stripped first.
/// Truncated frames and frames that do not form a valid id yield `None`.
///
/// # Examples
///
/// ```
/// use bikedock_hardware::poller::frame_to_bike_id;
/// use bikedock_hardware::traits::BikeFrame;
///
/// let frame = BikeFrame::complete(b"\x026A004A1589BC\x03\r".to_vec());
/// assert_eq!(frame_to_bike_id(&frame).unwrap().as_str(), "6A004A1589BC");
///
/// assert!(frame_to_bike_id(&BikeFrame::truncated(b"6A00".to_vec())).is_none());
/// ```
pub fn frame_to_bike_id(frame: &BikeFrame) -> Option<BikeId> {
    if !frame.terminated {
        debug!(len = frame.bytes.len(), "Discarding truncated bike frame");
        return None;
    }

    let text: String = frame
        .bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| char::from(b))
        .collect();

    match BikeId::new(&text) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(error = %e, "Discarding malformed bike frame");
            None
        }
    }
}
