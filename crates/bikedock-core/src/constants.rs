//! Timing and sizing constants for the dock controller.
//!
//! Values here are the defaults wired into the component configs; each
//! config struct can override them.
//!
//! # Usage
//!
//! ```
//! use bikedock_core::constants::*;
//! use std::time::Duration;
//!
//! let tick = Duration::from_millis(ACTUATOR_TICK_MS);
//! assert_eq!(tick, Duration::from_millis(250));
//! assert_eq!(FEEDBACK_FLASH_SECS, 4);
//! ```

// ============================================================================
// Actuator Timing
// ============================================================================

/// Period of the actuator countdown loop in milliseconds.
///
/// Every channel re-evaluates its countdown once per tick, so this is also
/// the resolution of every flash duration.
pub const ACTUATOR_TICK_MS: u64 = 250;

/// Length of every status-light flash issued by the dock controller.
pub const FEEDBACK_FLASH_SECS: i64 = 4;

/// How long the release actuator stays asserted on a successful check-out.
pub const RELEASE_PULSE_SECS: i64 = 1;

/// Capacity of each actuator command queue.
pub const ACTUATOR_QUEUE_CAPACITY: usize = 16;

// ============================================================================
// Identifier Limits
// ============================================================================

/// Maximum length of a bike identifier.
///
/// Bike tags observed in the field are 12 hex characters; the limit leaves
/// headroom for other tag formats while rejecting runaway serial garbage.
pub const MAX_BIKE_ID_LENGTH: usize = 32;

/// Maximum number of digits in a card code.
pub const MAX_CARD_CODE_LENGTH: usize = 32;

// ============================================================================
// Event Queue
// ============================================================================

/// Capacity of the sensor → controller event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

// ============================================================================
// Authority
// ============================================================================

/// Default timeout for a single authority request in milliseconds.
pub const DEFAULT_AUTHORITY_TIMEOUT_MS: u64 = 10_000;

/// Default authority API base URL.
pub const DEFAULT_AUTHORITY_BASE_URL: &str = "http://127.0.0.1:3000/api";

// ============================================================================
// Persistence
// ============================================================================

/// Default path of the persisted dock state file.
pub const DEFAULT_STATE_FILE: &str = "dock_state";

