//! The dock's decision worker.
//!
//! [`DockController`] is the single consumer of the event queue. For each
//! event it consults the state machine, asks the authority when needed,
//! applies and persists the transition, and signals the outcome on the
//! status panel. Events are handled strictly one at a time, authority round
//! trip included.
//!
//! Besides the per-event flashes, the occupancy light is held on while a bike
//! is docked. It is set when the controller is restored and again after
//! every accepted transition.

use crate::state_machine::{Decision, DockState, DockStateMachine, Rejection};
use bikedock_core::constants::{FEEDBACK_FLASH_SECS, RELEASE_PULSE_SECS};
use bikedock_core::{BikeId, DockEvent, DockId};
use bikedock_hardware::{ActuatorCommand, ChannelId, StatusPanel};
use bikedock_network::Authority;
use bikedock_storage::{PersistedState, StateStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Feedback timing and the occupancy light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds every status light stays on after an event.
    pub feedback_secs: i64,

    /// Seconds the release actuator is asserted on check-out.
    pub release_pulse_secs: i64,

    /// Channel held on while a bike is docked; `None` disables it.
    ///
    /// A feedback channel used here loses its flash to the hold.
    pub occupancy_channel: Option<ChannelId>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            feedback_secs: FEEDBACK_FLASH_SECS,
            release_pulse_secs: RELEASE_PULSE_SECS,
            occupancy_channel: Some(ChannelId::Occupancy),
        }
    }
}

impl ControllerConfig {
    /// Command that shows `state` on the occupancy light.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_controller::{ControllerConfig, DockState};
    /// use bikedock_hardware::{ActuatorCommand, ChannelId};
    ///
    /// let config = ControllerConfig::default();
    /// assert_eq!(
    ///     config.occupancy_signal(&DockState::Empty),
    ///     Some((ChannelId::Occupancy, ActuatorCommand::Off))
    /// );
    /// ```
    pub fn occupancy_signal(&self, state: &DockState) -> Option<(ChannelId, ActuatorCommand)> {
        let command = if state.is_occupied() {
            ActuatorCommand::Hold
        } else {
            ActuatorCommand::Off
        };
        self.occupancy_channel.map(|channel| (channel, command))
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Authority accepted the bike; the dock is now occupied.
    CheckedIn(BikeId),

    /// Authority refused the bike; the dock stays empty.
    CheckInDenied(BikeId),

    /// Authority released the bike; the dock is now empty.
    CheckedOut(BikeId),

    /// Authority refused the release; the bike stays docked.
    CheckOutDenied(BikeId),

    /// Event made no sense in the current state.
    Rejected(Rejection),
}

impl Outcome {
    /// Whether the event changed the dock state.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::CheckedIn(_) | Outcome::CheckedOut(_))
    }

    /// Actuator commands that signal this outcome.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_controller::{ControllerConfig, Outcome, Rejection};
    /// use bikedock_hardware::{ActuatorCommand, ChannelId};
    ///
    /// let outcome = Outcome::Rejected(Rejection::NoBikePresent);
    /// let signals = outcome.signals(&ControllerConfig::default());
    /// assert_eq!(signals, vec![(ChannelId::Amber, ActuatorCommand::from_secs(4))]);
    /// ```
    pub fn signals(&self, config: &ControllerConfig) -> Vec<(ChannelId, ActuatorCommand)> {
        let flash = ActuatorCommand::from_secs(config.feedback_secs);
        match self {
            Outcome::CheckedIn(_) => vec![(ChannelId::Green, flash)],
            Outcome::CheckedOut(_) => vec![
                (
                    ChannelId::Lock,
                    ActuatorCommand::from_secs(config.release_pulse_secs),
                ),
                (ChannelId::Green, flash),
            ],
            Outcome::CheckInDenied(_) | Outcome::CheckOutDenied(_) => {
                vec![(ChannelId::Red, flash)]
            }
            Outcome::Rejected(Rejection::NoBikePresent) => vec![(ChannelId::Amber, flash)],
            Outcome::Rejected(Rejection::AlreadyOccupied) => vec![(ChannelId::Amber2, flash)],
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::CheckedIn(bike_id) => write!(f, "checked in {bike_id}"),
            Outcome::CheckInDenied(bike_id) => write!(f, "check-in denied for {bike_id}"),
            Outcome::CheckedOut(bike_id) => write!(f, "checked out {bike_id}"),
            Outcome::CheckOutDenied(bike_id) => write!(f, "check-out denied for {bike_id}"),
            Outcome::Rejected(rejection) => write!(f, "rejected: {rejection}"),
        }
    }
}

/// Single consumer of dock events.
///
/// # Examples
///
/// ```no_run
/// use bikedock_controller::{ControllerConfig, DockController};
/// use bikedock_hardware::StatusPanel;
/// use bikedock_network::MockAuthority;
/// use bikedock_storage::{StateStore, StateStoreConfig};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = StateStore::new(StateStoreConfig::default())?;
/// let controller = DockController::restore(
///     MockAuthority::approving(),
///     store,
///     StatusPanel::new(),
///     ControllerConfig::default(),
/// )
/// .await;
///
/// let (_events_tx, events_rx) = mpsc::channel(32);
/// controller.run(events_rx, CancellationToken::new()).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DockController<A: Authority> {
    machine: DockStateMachine,
    authority: A,
    store: StateStore,
    panel: StatusPanel,
    config: ControllerConfig,
}

impl<A: Authority> DockController<A> {
    /// Create a controller around an existing state machine.
    ///
    /// Nothing is sent to the panel; see [`restore`](Self::restore).
    pub fn new(
        machine: DockStateMachine,
        authority: A,
        store: StateStore,
        panel: StatusPanel,
        config: ControllerConfig,
    ) -> Self {
        Self {
            machine,
            authority,
            store,
            panel,
            config,
        }
    }

    /// Build a controller whose initial state comes from the state file and
    /// show that state on the occupancy light.
    pub async fn restore(
        authority: A,
        store: StateStore,
        panel: StatusPanel,
        config: ControllerConfig,
    ) -> Self {
        let persisted = store.load().await;
        let machine = DockStateMachine::builder()
            .with_occupant(persisted.bike_id)
            .build();

        info!(state = %machine.current_state(), "Dock state restored");
        let controller = Self::new(machine, authority, store, panel, config);
        controller.show_occupancy();
        controller
    }

    /// Current dock state.
    pub fn state(&self) -> &DockState {
        self.machine.current_state()
    }

    /// The underlying state machine, for its transition history.
    pub fn machine(&self) -> &DockStateMachine {
        &self.machine
    }

    fn show_occupancy(&self) {
        let state = self.machine.current_state();
        if let Some((channel, command)) = self.config.occupancy_signal(state) {
            self.panel.send(channel, command);
        }
    }

    /// Announce the dock to the authority.
    ///
    /// A failed registration is logged; the dock keeps working.
    pub async fn register(&self, dock_id: &DockId) -> bool {
        let registered = self.authority.register(dock_id).await;
        if registered {
            info!(dock_id = %dock_id, "Dock registered");
        } else {
            warn!(dock_id = %dock_id, "Dock registration failed, continuing");
        }
        registered
    }

    /// Handle one event to completion.
    pub async fn handle_event(&mut self, event: DockEvent) -> Outcome {
        debug!(event = event.kind(), state = %self.machine.current_state(), "Handling event");

        let outcome = match self.machine.decide(&event) {
            Decision::CheckIn(bike_id) => self.check_in(bike_id).await,
            Decision::CheckOut { bike_id, card } => {
                if self.authority.check_out(&bike_id, &card).await {
                    self.apply(|machine| machine.check_out(), &bike_id).await;
                    Outcome::CheckedOut(bike_id)
                } else {
                    Outcome::CheckOutDenied(bike_id)
                }
            }
            Decision::Reject(rejection) => Outcome::Rejected(rejection),
        };

        if outcome.is_accepted() {
            info!(outcome = %outcome, "Event accepted");
        } else {
            info!(outcome = %outcome, "Event not accepted");
        }

        for (channel, command) in outcome.signals(&self.config) {
            self.panel.send(channel, command);
        }
        if outcome.is_accepted() {
            self.show_occupancy();
        }

        outcome
    }

    async fn check_in(&mut self, bike_id: BikeId) -> Outcome {
        if !self.authority.check_in(&bike_id).await {
            return Outcome::CheckInDenied(bike_id);
        }

        let docked = bike_id.clone();
        self.apply(move |machine| machine.check_in(docked), &bike_id)
            .await;
        Outcome::CheckedIn(bike_id)
    }

    /// Apply an authorized transition and persist the new state.
    ///
    /// The authority has already recorded the change, so a failed write is
    /// logged and the in-memory state kept.
    async fn apply<F>(&mut self, transition: F, bike_id: &BikeId)
    where
        F: FnOnce(&mut DockStateMachine) -> bikedock_core::Result<crate::StateTransition>,
    {
        if let Err(e) = transition(&mut self.machine) {
            error!(
                bike_id = %bike_id,
                error = %e,
                "Authorized transition rejected by state machine"
            );
            return;
        }

        let persisted = PersistedState::from(self.machine.current_state());
        if let Err(e) = self.store.save(&persisted).await {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist dock state"
            );
        }
    }

    /// Consume events until `cancel` fires or every producer is gone.
    ///
    /// An event that has started is always finished before stopping.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<DockEvent>,
        cancel: CancellationToken,
    ) -> Self {
        info!(state = %self.machine.current_state(), "Dock controller running");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.handle_event(event).await;
        }

        info!(state = %self.machine.current_state(), "Dock controller stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikedock_core::CardCode;
    use bikedock_network::{AuthorityCall, MockAuthority};
    use bikedock_storage::StateStoreConfig;
    use rstest::rstest;

    fn bike(id: &str) -> BikeId {
        BikeId::new(id).unwrap()
    }

    fn controller_in(
        dir: &tempfile::TempDir,
        authority: MockAuthority,
    ) -> DockController<MockAuthority> {
        let store = StateStore::new(StateStoreConfig::new(dir.path().join("dock_state"))).unwrap();
        DockController::new(
            DockStateMachine::new(),
            authority,
            store,
            StatusPanel::new(),
            ControllerConfig::default(),
        )
    }

    #[rstest]
    #[case(Outcome::CheckedIn(bike("B1")), vec![ChannelId::Green])]
    #[case(Outcome::CheckInDenied(bike("B1")), vec![ChannelId::Red])]
    #[case(Outcome::CheckedOut(bike("B1")), vec![ChannelId::Lock, ChannelId::Green])]
    #[case(Outcome::CheckOutDenied(bike("B1")), vec![ChannelId::Red])]
    #[case(Outcome::Rejected(Rejection::NoBikePresent), vec![ChannelId::Amber])]
    #[case(Outcome::Rejected(Rejection::AlreadyOccupied), vec![ChannelId::Amber2])]
    fn test_outcome_channels(#[case] outcome: Outcome, #[case] channels: Vec<ChannelId>) {
        let signals = outcome.signals(&ControllerConfig::default());
        let signalled: Vec<_> = signals.iter().map(|(channel, _)| *channel).collect();
        assert_eq!(signalled, channels);
    }

    #[rstest]
    #[case::occupied(DockState::Occupied(bike("B1")), ActuatorCommand::Hold)]
    #[case::empty(DockState::Empty, ActuatorCommand::Off)]
    fn test_occupancy_signal(#[case] state: DockState, #[case] command: ActuatorCommand) {
        let config = ControllerConfig::default();
        assert_eq!(
            config.occupancy_signal(&state),
            Some((ChannelId::Occupancy, command))
        );

        let disabled = ControllerConfig {
            occupancy_channel: None,
            ..ControllerConfig::default()
        };
        assert_eq!(disabled.occupancy_signal(&state), None);
    }

    #[test]
    fn test_release_pulse_is_short() {
        let signals = Outcome::CheckedOut(bike("B1")).signals(&ControllerConfig::default());
        assert_eq!(
            signals[0],
            (ChannelId::Lock, ActuatorCommand::from_secs(RELEASE_PULSE_SECS))
        );
        assert_eq!(
            signals[1],
            (ChannelId::Green, ActuatorCommand::from_secs(FEEDBACK_FLASH_SECS))
        );
    }

    #[tokio::test]
    async fn test_rejection_skips_authority() {
        let dir = tempfile::tempdir().unwrap();
        let authority = MockAuthority::approving();
        let mut controller = controller_in(&dir, authority.clone());

        let outcome = controller
            .handle_event(DockEvent::CardScanned(CardCode::new("42").unwrap()))
            .await;

        assert_eq!(outcome, Outcome::Rejected(Rejection::NoBikePresent));
        assert_eq!(authority.call_count(), 0);
        assert!(!dir.path().join("dock_state").exists());
    }

    #[tokio::test]
    async fn test_register_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let authority = MockAuthority::denying();
        let controller = controller_in(&dir, authority.clone());

        let dock_id = DockId::new("7").unwrap();
        assert!(!controller.register(&dock_id).await);
        assert_eq!(authority.calls(), vec![AuthorityCall::Register(dock_id)]);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_transition() {
        let dir = tempfile::tempdir().unwrap();
        // parent is a regular file, so every save fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = StateStore::new(StateStoreConfig::new(blocker.join("dock_state"))).unwrap();

        let mut controller = DockController::new(
            DockStateMachine::new(),
            MockAuthority::approving(),
            store,
            StatusPanel::new(),
            ControllerConfig::default(),
        );

        let outcome = controller
            .handle_event(DockEvent::BikeDetected(bike("BIKE123")))
            .await;
        assert_eq!(outcome, Outcome::CheckedIn(bike("BIKE123")));
        assert_eq!(controller.state(), &DockState::Occupied(bike("BIKE123")));
    }

    #[tokio::test]
    async fn test_run_stops_when_producers_gone() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir, MockAuthority::approving());

        let (events_tx, events_rx) = mpsc::channel(4);
        events_tx
            .send(DockEvent::BikeDetected(bike("BIKE123")))
            .await
            .unwrap();
        drop(events_tx);

        let controller = controller.run(events_rx, CancellationToken::new()).await;
        assert_eq!(controller.state(), &DockState::Occupied(bike("BIKE123")));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir, MockAuthority::approving());

        let (_events_tx, events_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let controller = controller.run(events_rx, cancel).await;
        assert_eq!(controller.state(), &DockState::Empty);
    }
}
