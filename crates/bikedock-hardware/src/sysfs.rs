//! Output line driven through the Linux sysfs GPIO interface.

use crate::{HardwareError, Result, traits::OutputLine};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default sysfs GPIO class directory.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// A GPIO pin configured as an output through `/sys/class/gpio`.
///
/// Pins are numbered with the SoC (BCM) numbering. Opening a pin exports it
/// if needed, configures it as an output and drives it low.
#[derive(Debug)]
pub struct SysfsGpioLine {
    name: String,
    pin: u32,
    value_path: PathBuf,
}

impl SysfsGpioLine {
    /// Open `pin` under the default sysfs root.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be exported or configured.
    pub fn open(pin: u32, name: impl Into<String>) -> Result<Self> {
        Self::open_at(DEFAULT_GPIO_ROOT, pin, name)
    }

    /// Open `pin` under a custom sysfs root.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be exported or configured.
    pub fn open_at(root: impl AsRef<Path>, pin: u32, name: impl Into<String>) -> Result<Self> {
        let root = root.as_ref();
        let name = name.into();
        let pin_dir = root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            std::fs::write(root.join("export"), pin.to_string()).map_err(|e| {
                HardwareError::initialization_failed(format!("export gpio{pin}: {e}"))
            })?;
        }

        // "low" sets the direction to output with an initial low level
        std::fs::write(pin_dir.join("direction"), "low").map_err(|e| {
            HardwareError::initialization_failed(format!("configure gpio{pin}: {e}"))
        })?;

        let mut line = Self {
            name,
            pin,
            value_path: pin_dir.join("value"),
        };
        line.set_level(false)?;

        debug!(pin, line = %line.name, "Configured GPIO output");
        Ok(line)
    }

    /// BCM pin number.
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl OutputLine for SysfsGpioLine {
    fn set_level(&mut self, on: bool) -> Result<()> {
        std::fs::write(&self.value_path, if on { "1" } else { "0" })
            .map_err(|e| HardwareError::output(&self.name, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_gpio_root(pin: u32) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let pin_dir = root.path().join(format!("gpio{pin}"));
        std::fs::create_dir_all(&pin_dir).unwrap();
        std::fs::write(pin_dir.join("direction"), "in").unwrap();
        std::fs::write(pin_dir.join("value"), "1").unwrap();
        root
    }

    #[test]
    fn test_open_configures_output_low() {
        let root = fake_gpio_root(21);
        let line = SysfsGpioLine::open_at(root.path(), 21, "lock").unwrap();

        let pin_dir = root.path().join("gpio21");
        assert_eq!(std::fs::read_to_string(pin_dir.join("direction")).unwrap(), "low");
        assert_eq!(std::fs::read_to_string(pin_dir.join("value")).unwrap(), "0");
        assert_eq!(line.pin(), 21);
        assert_eq!(line.name(), "lock");
    }

    #[test]
    fn test_set_level_writes_value() {
        let root = fake_gpio_root(19);
        let mut line = SysfsGpioLine::open_at(root.path(), 19, "green").unwrap();
        let value = root.path().join("gpio19").join("value");

        line.set_level(true).unwrap();
        assert_eq!(std::fs::read_to_string(&value).unwrap(), "1");

        line.set_level(false).unwrap();
        assert_eq!(std::fs::read_to_string(&value).unwrap(), "0");
    }

    #[test]
    fn test_unexported_pin_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = SysfsGpioLine::open_at(root.path(), 13, "red");
        assert!(matches!(
            result,
            Err(HardwareError::InitializationFailed { .. })
        ));
    }
}
