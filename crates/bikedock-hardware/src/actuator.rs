//! Countdown-driven actuator channels.
//!
//! Every status light and the release actuator is an [`ActuatorChannel`]: a
//! task that owns one [`OutputLine`] and one remaining-time counter. Other
//! tasks talk to it only through an [`ActuatorHandle`], which enqueues
//! commands without ever waiting.
//!
//! On each tick the channel drains its queue, folds the commands into the
//! counter, counts the counter down and drives the line:
//!
//! - a positive duration replaces the counter only if it is longer than what
//!   is left, so a short flash never cuts a long one short;
//! - zero switches the line off immediately;
//! - a negative value holds the line on until the next command.
//!
//! # Examples
//!
//! ```no_run
//! use bikedock_hardware::actuator::{ActuatorChannel, ActuatorConfig};
//! use bikedock_hardware::mock::MockOutputLine;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let (line, _observer) = MockOutputLine::new("green");
//! let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(channel.run(cancel.clone()));
//!
//! handle.trigger(4);
//! # }
//! ```

use crate::{Result, traits::OutputLine};
use bikedock_core::constants::{ACTUATOR_QUEUE_CAPACITY, ACTUATOR_TICK_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Command sent to an actuator channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Keep the line on for (at least) this long.
    Flash(Duration),

    /// Switch the line off now.
    Off,

    /// Keep the line on until the next command.
    Hold,
}

impl ActuatorCommand {
    /// Interpret a signed number of seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use bikedock_hardware::actuator::ActuatorCommand;
    /// use std::time::Duration;
    ///
    /// assert_eq!(ActuatorCommand::from_secs(4), ActuatorCommand::Flash(Duration::from_secs(4)));
    /// assert_eq!(ActuatorCommand::from_secs(0), ActuatorCommand::Off);
    /// assert_eq!(ActuatorCommand::from_secs(-1), ActuatorCommand::Hold);
    /// ```
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            0 => Self::Off,
            s if s < 0 => Self::Hold,
            s => Self::Flash(Duration::from_secs(s.unsigned_abs())),
        }
    }

    /// Signed millisecond value used by the countdown.
    fn as_millis(self) -> i64 {
        match self {
            Self::Flash(d) if d.is_zero() => 0,
            // sub-millisecond flashes still light the line for one tick
            Self::Flash(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX).max(1),
            Self::Off => 0,
            Self::Hold => -1,
        }
    }
}

/// Remaining-time counter of one channel.
///
/// Pure state, no timers: the channel task calls [`Countdown::tick`] once per
/// tick period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining_ms: i64,
    tick_ms: i64,
}

impl Countdown {
    /// Create an idle countdown with the given tick period.
    pub fn new(tick: Duration) -> Self {
        Self {
            remaining_ms: 0,
            tick_ms: i64::try_from(tick.as_millis()).unwrap_or(i64::MAX).max(1),
        }
    }

    /// Fold a command into the counter.
    pub fn apply(&mut self, command: ActuatorCommand) {
        let duration = command.as_millis();
        if duration <= 0 || duration > self.remaining_ms {
            self.remaining_ms = duration;
        }
    }

    /// Advance by one tick and return the output level.
    pub fn tick(&mut self) -> bool {
        if self.remaining_ms > 0 {
            self.remaining_ms = (self.remaining_ms - self.tick_ms).max(0);
        }
        self.is_active()
    }

    /// Whether the output should currently be on.
    pub fn is_active(&self) -> bool {
        self.remaining_ms != 0
    }

    /// Whether the channel is holding indefinitely.
    pub fn is_holding(&self) -> bool {
        self.remaining_ms < 0
    }

    /// Time left on a running flash.
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms.max(0).unsigned_abs())
    }
}

/// Actuator scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Tick period in milliseconds.
    pub tick_ms: u64,

    /// Capacity of each channel's command queue.
    pub queue_capacity: usize,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: ACTUATOR_TICK_MS,
            queue_capacity: ACTUATOR_QUEUE_CAPACITY,
        }
    }
}

impl ActuatorConfig {
    /// Set the tick period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Tick period as a `Duration`.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// One output line plus its countdown, run as its own task.
pub struct ActuatorChannel<L: OutputLine> {
    line: L,
    countdown: Countdown,
    tick: Duration,
    command_rx: mpsc::Receiver<ActuatorCommand>,
}

impl<L: OutputLine> ActuatorChannel<L> {
    /// Create a channel and the handle used to command it.
    pub fn new(line: L, config: &ActuatorConfig) -> (Self, ActuatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity.max(1));
        let tick = config.tick();

        let handle = ActuatorHandle {
            name: line.name().to_string(),
            command_tx,
        };

        let channel = Self {
            line,
            countdown: Countdown::new(tick),
            tick,
            command_rx,
        };

        (channel, handle)
    }

    /// Run the tick loop until `cancel` fires, then drive the line low.
    ///
    /// A failed write is logged and retried on the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be driven low on shutdown.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // level last written successfully; None forces a write
        let mut applied: Option<bool> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            while let Ok(command) = self.command_rx.try_recv() {
                self.countdown.apply(command);
            }

            let on = self.countdown.tick();
            if applied == Some(on) {
                continue;
            }

            match self.line.set_level(on) {
                Ok(()) => {
                    debug!(
                        line = self.line.name(),
                        on,
                        holding = self.countdown.is_holding(),
                        remaining = ?self.countdown.remaining(),
                        "Output level changed"
                    );
                    applied = Some(on);
                }
                Err(e) => {
                    warn!(line = self.line.name(), error = %e, "Failed to drive output line");
                    applied = None;
                }
            }
        }

        debug!(line = self.line.name(), "Actuator channel stopping");
        self.line.set_level(false)
    }
}

/// Cheap, cloneable sender side of an actuator channel.
#[derive(Debug, Clone)]
pub struct ActuatorHandle {
    name: String,
    command_tx: mpsc::Sender<ActuatorCommand>,
}

impl ActuatorHandle {
    /// Enqueue a command without waiting.
    ///
    /// A full queue or a stopped channel drops the command with a warning.
    pub fn send(&self, command: ActuatorCommand) {
        match self.command_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(line = %self.name, ?command, "Actuator queue full, dropping command");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(line = %self.name, ?command, "Actuator channel stopped, dropping command");
            }
        }
    }

    /// Enqueue a signed duration in seconds.
    pub fn trigger(&self, secs: i64) {
        self.send(ActuatorCommand::from_secs(secs));
    }

    /// Switch the line off now.
    pub fn off(&self) {
        self.send(ActuatorCommand::Off);
    }

    /// Keep the line on until the next command.
    pub fn hold(&self) {
        self.send(ActuatorCommand::Hold);
    }

    /// Name of the line behind this channel.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOutputLine;
    use rstest::rstest;
    use tokio::time::Instant;

    const TICK: Duration = Duration::from_millis(250);

    fn ticks_until_off(countdown: &mut Countdown) -> usize {
        let mut ticks = 1;
        while countdown.tick() {
            ticks += 1;
            assert!(ticks < 10_000, "countdown never finished");
        }
        ticks
    }

    #[rstest]
    #[case(1, 4)]
    #[case(4, 16)]
    #[case(5, 20)]
    fn test_flash_lasts_whole_ticks(#[case] secs: i64, #[case] ticks: usize) {
        let mut countdown = Countdown::new(TICK);
        countdown.apply(ActuatorCommand::from_secs(secs));
        assert_eq!(ticks_until_off(&mut countdown), ticks);
    }

    #[test]
    fn test_shorter_flash_does_not_shorten_longer() {
        let mut countdown = Countdown::new(TICK);
        countdown.apply(ActuatorCommand::from_secs(5));
        countdown.apply(ActuatorCommand::from_secs(2));
        assert_eq!(countdown.remaining(), Duration::from_secs(5));
        assert_eq!(ticks_until_off(&mut countdown), 20);
    }

    #[test]
    fn test_longer_flash_extends() {
        let mut countdown = Countdown::new(TICK);
        countdown.apply(ActuatorCommand::from_secs(1));
        countdown.tick();
        countdown.apply(ActuatorCommand::from_secs(3));
        assert_eq!(countdown.remaining(), Duration::from_secs(3));
    }

    #[test]
    fn test_off_and_hold_always_replace() {
        let mut countdown = Countdown::new(TICK);
        countdown.apply(ActuatorCommand::from_secs(5));
        countdown.apply(ActuatorCommand::Off);
        assert!(!countdown.tick());

        countdown.apply(ActuatorCommand::Hold);
        for _ in 0..1_000 {
            assert!(countdown.tick());
        }
        assert!(countdown.is_holding());

        // a flash is longer than nothing left, so it ends the hold
        countdown.apply(ActuatorCommand::from_secs(1));
        assert!(!countdown.is_holding());
        assert_eq!(ticks_until_off(&mut countdown), 4);
    }

    #[test]
    fn test_partial_tick_duration_still_ends() {
        let mut countdown = Countdown::new(TICK);
        countdown.apply(ActuatorCommand::Flash(Duration::from_millis(300)));
        assert!(countdown.tick());
        assert!(!countdown.tick());
    }

    #[test]
    fn test_config_tick() {
        let config = ActuatorConfig::default().with_tick(Duration::from_millis(100));
        assert_eq!(config.tick(), Duration::from_millis(100));
        assert_eq!(ActuatorConfig::default().tick(), TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_keeps_longest_flash() {
        let (line, mut observer) = MockOutputLine::new("green");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(channel.run(cancel.clone()));

        let start = Instant::now();
        handle.trigger(5);
        handle.trigger(2);

        observer.wait_for(true).await.unwrap();
        observer.wait_for(false).await.unwrap();

        let lit = start.elapsed();
        assert!(lit >= Duration::from_millis(4750), "off after {lit:?}");
        assert!(lit <= Duration::from_millis(5250), "off after {lit:?}");
        assert_eq!(observer.rising_edges(), 1);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_off_is_immediate() {
        let (line, mut observer) = MockOutputLine::new("red");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        let cancel = CancellationToken::new();
        tokio::spawn(channel.run(cancel.clone()));

        handle.trigger(10);
        observer.wait_for(true).await.unwrap();

        let start = Instant::now();
        handle.trigger(0);
        observer.wait_for(false).await.unwrap();
        assert!(start.elapsed() <= TICK);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_hold_until_off() {
        let (line, mut observer) = MockOutputLine::new("amber");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        let cancel = CancellationToken::new();
        tokio::spawn(channel.run(cancel.clone()));

        handle.trigger(-1);
        observer.wait_for(true).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(observer.is_on());

        handle.off();
        observer.wait_for(false).await.unwrap();

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_retries_failed_write() {
        let (line, mut observer) = MockOutputLine::new("lock");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        let cancel = CancellationToken::new();
        tokio::spawn(channel.run(cancel.clone()));

        observer.set_failing(true);
        handle.hold();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!observer.is_on());

        observer.set_failing(false);
        observer.wait_for(true).await.unwrap();

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drives_line_low() {
        let (line, mut observer) = MockOutputLine::new("amber2");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(channel.run(cancel.clone()));

        handle.hold();
        observer.wait_for(true).await.unwrap();

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert!(!observer.is_on());
    }

    #[tokio::test]
    async fn test_send_to_stopped_channel_is_dropped() {
        let (line, _observer) = MockOutputLine::new("green");
        let (channel, handle) = ActuatorChannel::new(line, &ActuatorConfig::default());
        drop(channel);

        handle.trigger(4);
        assert_eq!(handle.name(), "green");
    }
}
