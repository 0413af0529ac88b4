//! The dock's set of actuator channels.
//!
//! [`ActuatorBank`] collects one output line per [`ChannelId`] and spawns a
//! channel task for each. The resulting [`StatusPanel`] is what the
//! controller holds: a cloneable map of channel handles.

use crate::actuator::{ActuatorChannel, ActuatorCommand, ActuatorConfig, ActuatorHandle};
use crate::devices::AnyOutputLine;
use crate::manager::drain_tasks;
use crate::types::ChannelId;
use crate::Result;
use std::collections::HashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Command front-end for all actuator channels of a dock.
///
/// Commands to channels that were never registered are dropped.
#[derive(Debug, Clone, Default)]
pub struct StatusPanel {
    channels: HashMap<ChannelId, ActuatorHandle>,
}

impl StatusPanel {
    /// Create a panel with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the handle for a channel.
    pub fn insert(&mut self, channel: ChannelId, handle: ActuatorHandle) {
        self.channels.insert(channel, handle);
    }

    /// Enqueue a command on a channel without waiting.
    pub fn send(&self, channel: ChannelId, command: ActuatorCommand) {
        match self.channels.get(&channel) {
            Some(handle) => handle.send(command),
            None => debug!(%channel, ?command, "No actuator registered for channel"),
        }
    }

    /// Send a signed duration in seconds to a channel.
    pub fn trigger(&self, channel: ChannelId, secs: i64) {
        self.send(channel, ActuatorCommand::from_secs(secs));
    }

    /// Whether a handle is registered for `channel`.
    pub fn contains(&self, channel: ChannelId) -> bool {
        self.channels.contains_key(&channel)
    }
}

/// Builder collecting output lines before the channel tasks start.
///
/// # Examples
///
/// ```no_run
/// use bikedock_hardware::actuator::ActuatorConfig;
/// use bikedock_hardware::mock::MockOutputLine;
/// use bikedock_hardware::panel::ActuatorBank;
/// use bikedock_hardware::types::ChannelId;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> bikedock_hardware::Result<()> {
/// let mut bank = ActuatorBank::new(ActuatorConfig::default());
/// let (green, _observer) = MockOutputLine::new("green");
/// bank.register(ChannelId::Green, green.into());
///
/// let handle = bank.start(CancellationToken::new());
/// handle.panel().trigger(ChannelId::Green, 4);
/// handle.shutdown().await
/// # }
/// ```
#[derive(Debug)]
pub struct ActuatorBank {
    config: ActuatorConfig,
    lines: Vec<(ChannelId, AnyOutputLine)>,
}

impl ActuatorBank {
    /// Create an empty bank whose channels will use `config`.
    pub fn new(config: ActuatorConfig) -> Self {
        Self {
            config,
            lines: Vec::new(),
        }
    }

    /// Register the output line for a channel, replacing any earlier one.
    pub fn register(&mut self, channel: ChannelId, line: AnyOutputLine) {
        self.lines.retain(|(existing, _)| *existing != channel);
        self.lines.push((channel, line));
    }

    /// Number of registered lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line has been registered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Spawn one task per registered line.
    ///
    /// Channel tasks stop when `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> ActuatorBankHandle {
        let mut tasks = JoinSet::new();
        let mut panel = StatusPanel::new();

        for (channel, line) in self.lines {
            let (actuator, handle) = ActuatorChannel::new(line, &self.config);
            panel.insert(channel, handle);
            tasks.spawn(actuator.run(cancel.clone()));
        }

        info!(channels = panel.channels.len(), "Actuator channels started");

        ActuatorBankHandle {
            panel,
            cancel,
            tasks,
        }
    }
}

/// Running actuator channels.
#[derive(Debug)]
pub struct ActuatorBankHandle {
    panel: StatusPanel,
    cancel: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl ActuatorBankHandle {
    /// Panel for sending commands to the running channels.
    pub fn panel(&self) -> StatusPanel {
        self.panel.clone()
    }

    /// Stop every channel and wait for the lines to be driven low.
    ///
    /// # Errors
    ///
    /// Never fails; channel failures are logged.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        drain_tasks(&mut self.tasks, "actuator").await;
        Ok(())
    }
}
