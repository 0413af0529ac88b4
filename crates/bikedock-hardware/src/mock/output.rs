//! Mock output line for testing actuator channels without GPIO.

use crate::{HardwareError, Result, traits::OutputLine};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// Mock output line.
///
/// The current level is published through a `watch` channel so tests can
/// observe (and wait for) level changes from outside the actuator task.
///
/// # Examples
///
/// ```
/// use bikedock_hardware::mock::MockOutputLine;
/// use bikedock_hardware::traits::OutputLine;
///
/// let (mut line, handle) = MockOutputLine::new("green");
/// line.set_level(true).unwrap();
/// assert!(handle.is_on());
/// assert_eq!(handle.rising_edges(), 1);
/// ```
#[derive(Debug)]
pub struct MockOutputLine {
    name: String,
    level_tx: watch::Sender<bool>,
    rising_edges: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockOutputLine {
    /// Create a new mock line, initially low.
    pub fn new(name: impl Into<String>) -> (Self, MockOutputHandle) {
        let (level_tx, level_rx) = watch::channel(false);
        let rising_edges = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));

        let line = Self {
            name: name.into(),
            level_tx,
            rising_edges: Arc::clone(&rising_edges),
            failing: Arc::clone(&failing),
        };

        let handle = MockOutputHandle {
            level_rx,
            rising_edges,
            failing,
        };

        (line, handle)
    }
}

impl OutputLine for MockOutputLine {
    fn set_level(&mut self, on: bool) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::output(&self.name, "simulated write failure"));
        }

        let was_on = *self.level_tx.borrow();
        if on && !was_on {
            self.rising_edges.fetch_add(1, Ordering::SeqCst);
        }
        self.level_tx.send_replace(on);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Observer side of a [`MockOutputLine`].
#[derive(Debug, Clone)]
pub struct MockOutputHandle {
    level_rx: watch::Receiver<bool>,
    rising_edges: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockOutputHandle {
    /// Current line level.
    pub fn is_on(&self) -> bool {
        *self.level_rx.borrow()
    }

    /// Number of low → high transitions seen so far.
    pub fn rising_edges(&self) -> usize {
        self.rising_edges.load(Ordering::SeqCst)
    }

    /// Wait until the line reaches `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line has been dropped.
    pub async fn wait_for(&mut self, level: bool) -> Result<()> {
        self.level_rx
            .wait_for(|current| *current == level)
            .await
            .map(|_| ())
            .map_err(|_| HardwareError::disconnected("Mock output line dropped"))
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}
