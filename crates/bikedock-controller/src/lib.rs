//! Dock controller crate.
//!
//! This crate contains the occupancy state machine and the decision worker
//! that turns sensor events into authority calls, state changes and status
//! light feedback.

pub mod controller;
pub mod state_machine;

pub use controller::{ControllerConfig, DockController, Outcome};
pub use state_machine::{
    Decision, DockState, DockStateMachine, DockStateMachineBuilder, Rejection, StateTransition,
};
