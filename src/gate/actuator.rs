//! Gate output abstraction.
//!
//! The turnstile is driven by a single digital output: high releases the
//! gate, low locks it. Two implementations exist:
//! - [`GpioActuator`] writes a Linux sysfs GPIO line
//! - [`NullActuator`] only records what it was asked to do
//!
//! Which one is used is decided by configuration ([`ActuatorKind`]), never
//! by probing for hardware.

use crate::GateError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Attempts at configuring a freshly exported line before giving up.
const EXPORT_SETTLE_ATTEMPTS: u32 = 10;

/// Pause between those attempts while udev fixes up the line.
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// A device that can hold the gate open.
pub trait GateActuator: Send {
    /// Drive the output high (`true`) or low (`false`).
    fn set_output(&mut self, on: bool) -> Result<(), GateError>;

    /// Release the gate for `duration`, then lock it again.
    ///
    /// Blocks for the whole cycle.
    fn open(&mut self, duration: Duration) -> Result<(), GateError> {
        info!(duration_ms = duration.as_millis() as u64, "Gate open");
        self.set_output(true)?;
        thread::sleep(duration);
        self.set_output(false)
    }

    /// Force the output low.
    fn reset(&mut self) -> Result<(), GateError> {
        self.set_output(false)
    }
}

/// Actuator selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorKind {
    /// Sysfs GPIO line with the given number.
    Gpio {
        /// GPIO line number.
        pin: u32,
    },
    /// No hardware; transitions are only logged and recorded.
    Null,
}

impl ActuatorKind {
    /// Acquire the configured actuator.
    ///
    /// # Errors
    /// `HardwareError` if the GPIO line cannot be claimed. Callers are
    /// expected to treat this as fatal.
    pub fn build(&self) -> Result<Box<dyn GateActuator>, GateError> {
        match self {
            ActuatorKind::Gpio { pin } => Ok(Box::new(GpioActuator::new(*pin)?)),
            ActuatorKind::Null => Ok(Box::new(NullActuator::new())),
        }
    }
}

/// Sysfs-backed GPIO output.
#[derive(Debug)]
pub struct GpioActuator {
    pin: u32,
    value_path: PathBuf,
}

impl GpioActuator {
    /// Claim `pin` under `/sys/class/gpio` as an output driven low.
    pub fn new(pin: u32) -> Result<Self, GateError> {
        Self::with_root(pin, Path::new(SYSFS_GPIO_ROOT))
    }

    /// Claim `pin` under a custom sysfs root.
    pub fn with_root(pin: u32, root: &Path) -> Result<Self, GateError> {
        let line_dir = root.join(format!("gpio{}", pin));

        if !line_dir.exists() {
            fs::write(root.join("export"), pin.to_string()).map_err(|e| {
                GateError::HardwareError(format!(
                    "Could not export GPIO {} (missing permissions?): {}",
                    pin, e
                ))
            })?;
        }

        write_when_ready(&line_dir.join("direction"), "out").map_err(|e| {
            GateError::HardwareError(format!(
                "Could not set GPIO {} as output: {}",
                pin, e
            ))
        })?;

        let mut actuator = Self {
            pin,
            value_path: line_dir.join("value"),
        };
        actuator.set_output(false)?;
        info!(pin, "GPIO actuator ready");
        Ok(actuator)
    }

    /// GPIO line number.
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

/// Write a sysfs attribute of a line that may have just been exported.
///
/// The attribute can be missing or root-owned for a short while after the
/// export, so `NotFound` and `PermissionDenied` are retried.
fn write_when_ready(path: &Path, value: &str) -> std::io::Result<()> {
    let mut attempt = 1;
    loop {
        match fs::write(path, value) {
            Err(e)
                if attempt < EXPORT_SETTLE_ATTEMPTS
                    && matches!(
                        e.kind(),
                        ErrorKind::NotFound | ErrorKind::PermissionDenied
                    ) =>
            {
                debug!(path = %path.display(), attempt, error = %e, "GPIO line not ready");
                attempt += 1;
                thread::sleep(EXPORT_SETTLE_DELAY);
            }
            result => return result,
        }
    }
}

impl GateActuator for GpioActuator {
    fn set_output(&mut self, on: bool) -> Result<(), GateError> {
        let value = if on { "1" } else { "0" };
        fs::write(&self.value_path, value).map_err(|e| {
            GateError::HardwareError(format!("Could not write GPIO {}: {}", self.pin, e))
        })?;
        debug!(pin = self.pin, on, "GPIO output set");
        Ok(())
    }
}

/// Actuator that drives nothing.
///
/// Clones share one transition log, so a test can keep a handle after
/// boxing the actuator.
#[derive(Debug, Clone, Default)]
pub struct NullActuator {
    transitions: Arc<Mutex<Vec<bool>>>,
}

impl NullActuator {
    /// Create a null actuator with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every output value set so far, in order.
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl GateActuator for NullActuator {
    fn set_output(&mut self, on: bool) -> Result<(), GateError> {
        debug!(on, "Null actuator output set");
        let mut log = self
            .transitions
            .lock()
            .map_err(|_| GateError::HardwareError("transition log poisoned".to_string()))?;
        log.push(on);
        Ok(())
    }
}
