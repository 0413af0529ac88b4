use crate::{
    Result,
    constants::{MAX_BIKE_ID_LENGTH, MAX_CARD_CODE_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Bike identifier read from the bike-presence sensor.
///
/// Opaque to the controller; it is only compared, logged, persisted and
/// forwarded to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BikeId(String);

impl BikeId {
    /// Create a new bike id with validation.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidBikeId` if the id is empty, longer than
    /// `MAX_BIKE_ID_LENGTH`, or contains non-printable / non-ASCII characters.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::InvalidBikeId("bike id is empty".to_string()));
        }

        if id.len() > MAX_BIKE_ID_LENGTH {
            return Err(Error::InvalidBikeId(format!(
                "bike id must be at most {MAX_BIKE_ID_LENGTH} chars, got {}",
                id.len()
            )));
        }

        if !id.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::InvalidBikeId(format!(
                "bike id must be printable ASCII: {id:?}"
            )));
        }

        Ok(BikeId(id.to_string()))
    }

    /// Get the bike id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BikeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BikeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BikeId::new(s)
    }
}

impl TryFrom<String> for BikeId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        BikeId::new(&value)
    }
}

impl From<BikeId> for String {
    fn from(id: BikeId) -> Self {
        id.0
    }
}

/// Card code typed in or swiped at the card reader.
///
/// # Security
/// This type implements constant-time comparison so that comparing a
/// presented code never leaks how many leading digits matched.
#[derive(Debug, Clone, Eq)]
pub struct CardCode(String);

impl CardCode {
    /// Create a new card code with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardCode` if:
    /// - The code is empty or longer than `MAX_CARD_CODE_LENGTH`
    /// - The code contains anything other than ASCII digits
    pub fn new(code: &str) -> Result<Self> {
        let len = code.len();
        if len == 0 || len > MAX_CARD_CODE_LENGTH {
            return Err(Error::InvalidCardCode(format!(
                "card code must be 1-{MAX_CARD_CODE_LENGTH} digits, got {len}"
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidCardCode(
                "card code must contain only digits".to_string(),
            ));
        }

        Ok(CardCode(code.to_string()))
    }

    /// Build a card code from a sequence of decimal digits.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardCode` if any value is greater than 9 or the
    /// resulting code is out of range.
    pub fn from_digits(digits: &[u8]) -> Result<Self> {
        let mut code = String::with_capacity(digits.len());
        for &d in digits {
            let c = char::from_digit(u32::from(d), 10)
                .ok_or_else(|| Error::InvalidCardCode(format!("digit out of range: {d}")))?;
            code.push(c);
        }
        CardCode::new(&code)
    }

    /// Get the card code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CardCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl fmt::Display for CardCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardCode::new(s)
    }
}

/// Identity of this dock as known to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockId(String);

impl DockId {
    /// Create a new dock id.
    ///
    /// # Errors
    /// Returns `Error::InvalidDockId` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidDockId("dock id is empty".to_string()));
        }
        Ok(DockId(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event produced by a sensor poller and consumed by the dock controller.
///
/// Events are consumed exactly once, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockEvent {
    /// A complete card code was entered at the card reader.
    CardScanned(CardCode),

    /// The bike-presence sensor reported a bike tag.
    BikeDetected(BikeId),
}

impl DockEvent {
    /// Short name of the event kind, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DockEvent::CardScanned(_) => "card_scanned",
            DockEvent::BikeDetected(_) => "bike_detected",
        }
    }
}

impl fmt::Display for DockEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DockEvent::CardScanned(code) => write!(f, "CardScanned({code})"),
            DockEvent::BikeDetected(bike) => write!(f, "BikeDetected({bike})"),
        }
    }
}
