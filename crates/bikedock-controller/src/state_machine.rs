//! Dock occupancy state machine.
//!
//! A dock is either empty or holds exactly one bike. This module decides
//! what each sensor event means in the current state and applies the
//! resulting transitions; talking to the authority and driving the lights is
//! left to the [`DockController`](crate::DockController).
//!
//! # States
//!
//! - `Empty`: no bike docked
//! - `Occupied(bike)`: `bike` is docked
//!
//! # Decisions
//!
//! | State | Event | Decision |
//! |---|---|---|
//! | `Empty` | `BikeDetected(b)` | ask to check `b` in |
//! | `Occupied(b)` | `CardScanned(c)` | ask to check `b` out with `c` |
//! | `Empty` | `CardScanned(_)` | reject: no bike present |
//! | `Occupied(_)` | `BikeDetected(_)` | reject: already occupied |
//!
//! # Examples
//!
//! ```
//! use bikedock_controller::{Decision, DockState, DockStateMachine};
//! use bikedock_core::{BikeId, DockEvent};
//!
//! let mut machine = DockStateMachine::new();
//! let bike = BikeId::new("BIKE123").unwrap();
//!
//! let decision = machine.decide(&DockEvent::BikeDetected(bike.clone()));
//! assert_eq!(decision, Decision::CheckIn(bike.clone()));
//!
//! machine.check_in(bike.clone()).unwrap();
//! assert_eq!(machine.current_state(), &DockState::Occupied(bike));
//! ```
//!
//! # Builder Pattern
//!
//! For restoring a dock after a restart:
//!
//! ```
//! use bikedock_controller::DockStateMachine;
//! use bikedock_core::BikeId;
//!
//! let machine = DockStateMachine::builder()
//!     .with_occupant(Some(BikeId::new("BIKE123").unwrap()))
//!     .build();
//!
//! assert!(machine.current_state().is_occupied());
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bikedock_core::{BikeId, CardCode, DockEvent, Error, Result};
use bikedock_storage::PersistedState;

/// Maximum number of state transitions to keep in history.
///
/// A dock sees a handful of transitions per hour, so 100 entries cover
/// several days of activity at a few kilobytes.
const MAX_HISTORY_SIZE: usize = 100;

/// Occupancy of the dock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockState {
    /// No bike docked.
    #[default]
    Empty,

    /// The given bike is docked.
    Occupied(BikeId),
}

impl fmt::Display for DockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockState::Empty => write!(f, "Empty"),
            DockState::Occupied(bike_id) => write!(f, "Occupied({})", bike_id),
        }
    }
}

impl DockState {
    /// The docked bike, if any.
    pub fn occupant(&self) -> Option<&BikeId> {
        match self {
            DockState::Empty => None,
            DockState::Occupied(bike_id) => Some(bike_id),
        }
    }

    /// Whether a bike is docked.
    pub fn is_occupied(&self) -> bool {
        matches!(self, DockState::Occupied(_))
    }

    /// Decide what `event` means in this state.
    ///
    /// Pure: no I/O, no mutation.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_controller::{Decision, DockState, Rejection};
    /// use bikedock_core::{CardCode, DockEvent};
    ///
    /// let event = DockEvent::CardScanned(CardCode::new("42").unwrap());
    /// assert_eq!(
    ///     DockState::Empty.decide(&event),
    ///     Decision::Reject(Rejection::NoBikePresent)
    /// );
    /// ```
    pub fn decide(&self, event: &DockEvent) -> Decision {
        match (self, event) {
            (DockState::Empty, DockEvent::BikeDetected(bike_id)) => {
                Decision::CheckIn(bike_id.clone())
            }
            (DockState::Occupied(bike_id), DockEvent::CardScanned(card)) => Decision::CheckOut {
                bike_id: bike_id.clone(),
                card: card.clone(),
            },
            (DockState::Empty, DockEvent::CardScanned(_)) => {
                Decision::Reject(Rejection::NoBikePresent)
            }
            (DockState::Occupied(_), DockEvent::BikeDetected(_)) => {
                Decision::Reject(Rejection::AlreadyOccupied)
            }
        }
    }
}

impl From<&DockState> for PersistedState {
    fn from(state: &DockState) -> Self {
        PersistedState {
            bike_id: state.occupant().cloned(),
        }
    }
}

impl From<PersistedState> for DockState {
    fn from(state: PersistedState) -> Self {
        match state.bike_id {
            Some(bike_id) => DockState::Occupied(bike_id),
            None => DockState::Empty,
        }
    }
}

/// Why an event was rejected without asking the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Card scanned at an empty dock.
    NoBikePresent,

    /// Bike detected at a dock that already holds one.
    AlreadyOccupied,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoBikePresent => write!(f, "no bike present"),
            Rejection::AlreadyOccupied => write!(f, "already occupied"),
        }
    }
}

/// What the controller should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Ask the authority to accept this bike.
    CheckIn(BikeId),

    /// Ask the authority to release this bike to the card holder.
    CheckOut { bike_id: BikeId, card: CardCode },

    /// Reject locally; the authority is not consulted.
    Reject(Rejection),
}

/// Represents a single state transition with timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: DockState,

    /// The state transitioned to.
    pub to: DockState,

    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

impl StateTransition {
    /// Create a new state transition record stamped with the current time.
    pub fn new(from: DockState, to: DockState) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
        }
    }
}

/// State machine owning the dock occupancy.
///
/// Only two transitions exist: check-in (`Empty` to `Occupied`) and
/// check-out (`Occupied` to `Empty`). Anything else is rejected with
/// [`Error::InvalidStateTransition`] and leaves the state untouched.
///
/// # Thread Safety
///
/// The machine has no internal locking. It is owned by the single
/// controller task that consumes the event queue.
#[derive(Debug)]
pub struct DockStateMachine {
    /// Current occupancy.
    current_state: DockState,

    /// History of state transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,
}

impl DockStateMachine {
    /// Create a new state machine for an empty dock.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for constructing a state machine with custom configuration.
    pub fn builder() -> DockStateMachineBuilder {
        DockStateMachineBuilder::default()
    }

    /// Get the current state of the machine.
    pub fn current_state(&self) -> &DockState {
        &self.current_state
    }

    /// The docked bike, if any.
    pub fn occupant(&self) -> Option<&BikeId> {
        self.current_state.occupant()
    }

    /// Decide what `event` means in the current state.
    pub fn decide(&self, event: &DockEvent) -> Decision {
        self.current_state.decide(event)
    }

    /// Get a reference to the state transition history, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N state transitions.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Record that `bike_id` was checked in.
    ///
    /// # Errors
    ///
    /// Returns an error if the dock is already occupied.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_controller::DockStateMachine;
    /// use bikedock_core::BikeId;
    ///
    /// let mut machine = DockStateMachine::new();
    /// machine.check_in(BikeId::new("BIKE1").unwrap()).unwrap();
    ///
    /// // A second bike cannot be checked in
    /// assert!(machine.check_in(BikeId::new("BIKE2").unwrap()).is_err());
    /// ```
    pub fn check_in(&mut self, bike_id: BikeId) -> Result<StateTransition> {
        let target = DockState::Occupied(bike_id);
        if self.current_state.is_occupied() {
            return Err(self.invalid(&target));
        }
        Ok(self.perform_state_change(target))
    }

    /// Record that the docked bike was checked out.
    ///
    /// # Errors
    ///
    /// Returns an error if the dock is empty.
    pub fn check_out(&mut self) -> Result<StateTransition> {
        if !self.current_state.is_occupied() {
            return Err(self.invalid(&DockState::Empty));
        }
        Ok(self.perform_state_change(DockState::Empty))
    }

    fn invalid(&self, target: &DockState) -> Error {
        Error::InvalidStateTransition {
            from: self.current_state.to_string(),
            to: target.to_string(),
        }
    }

    fn perform_state_change(&mut self, new_state: DockState) -> StateTransition {
        let previous = std::mem::replace(&mut self.current_state, new_state);
        let transition = StateTransition::new(previous, self.current_state.clone());

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        transition
    }
}

impl Default for DockStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing `DockStateMachine` instances.
#[derive(Debug)]
pub struct DockStateMachineBuilder {
    initial_state: DockState,
    history: VecDeque<StateTransition>,
}

impl DockStateMachineBuilder {
    /// Set the initial state for the machine.
    pub fn with_initial_state(mut self, state: DockState) -> Self {
        self.initial_state = state;
        self
    }

    /// Start occupied by `bike_id`, or empty for `None`.
    pub fn with_occupant(self, bike_id: Option<BikeId>) -> Self {
        self.with_initial_state(PersistedState { bike_id }.into())
    }

    /// Build the state machine with configured parameters.
    pub fn build(self) -> DockStateMachine {
        DockStateMachine {
            current_state: self.initial_state,
            history: self.history,
        }
    }
}

impl Default for DockStateMachineBuilder {
    fn default() -> Self {
        Self {
            initial_state: DockState::Empty,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}
