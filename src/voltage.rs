//! # Low-voltage detection.
//!
//! ```text
//! Supervisor ──sample_low()──► PinVoltageMonitor ──read_level()──► InputPin (SysfsPin)
//!                                   │                                 acquire → read → release
//!                                   └─ Err ► warn once, then debug ► false
//! ```
//!
//! ## Rules
//! - Every sample acquires and releases the pin; no handle is kept between samples.
//! - A failed read is "not low": transient faults never stop supervision.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::PinError;

/// Capability sampled by the supervisor on every loop iteration.
pub trait VoltageMonitor: Send + Sync + 'static {
    /// `true` when supply voltage is low.
    fn sample_low(&self) -> bool;
}

/// A single digital input.
pub trait InputPin: Send + Sync + 'static {
    /// Electrical level: `true` = high.
    fn read_level(&self) -> Result<bool, PinError>;
}

/// Input pin read through the Linux sysfs GPIO interface.
///
/// Exports the pin when it is not already exported and unexports it again
/// after reading, so each call is a full acquire/read/release cycle.
#[derive(Debug, Clone)]
pub struct SysfsPin {
    root: PathBuf,
    pin: u32,
}

impl SysfsPin {
    pub fn new(root: impl Into<PathBuf>, pin: u32) -> Self {
        Self {
            root: root.into(),
            pin,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn io(path: PathBuf) -> impl FnOnce(std::io::Error) -> PinError {
        move |source| PinError::Io { path, source }
    }

    fn acquire(&self) -> Result<bool, PinError> {
        if self.pin_dir().is_dir() {
            return Ok(false);
        }
        let export = self.root.join("export");
        std::fs::write(&export, self.pin.to_string()).map_err(Self::io(export))?;
        let direction = self.pin_dir().join("direction");
        std::fs::write(&direction, "in").map_err(Self::io(direction))?;
        Ok(true)
    }

    fn release(&self) {
        let unexport = self.root.join("unexport");
        if let Err(e) = std::fs::write(&unexport, self.pin.to_string()) {
            debug!(pin = self.pin, error = %e, "unexport failed");
        }
    }

    fn read_value(&self) -> Result<bool, PinError> {
        let path = self.pin_dir().join("value");
        let raw = std::fs::read_to_string(&path).map_err(Self::io(path.clone()))?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(PinError::InvalidLevel { path, raw }),
        }
    }
}

impl InputPin for SysfsPin {
    fn read_level(&self) -> Result<bool, PinError> {
        let exported = self.acquire()?;
        let level = self.read_value();
        if exported {
            self.release();
        }
        level
    }
}

/// [`VoltageMonitor`] over an [`InputPin`] with a configurable active level.
pub struct PinVoltageMonitor {
    pin: Box<dyn InputPin>,
    active_low: bool,
    failing: AtomicBool,
}

impl PinVoltageMonitor {
    pub fn new(pin: impl InputPin, active_low: bool) -> Self {
        Self {
            pin: Box::new(pin),
            active_low,
            failing: AtomicBool::new(false),
        }
    }
}

impl VoltageMonitor for PinVoltageMonitor {
    fn sample_low(&self) -> bool {
        match self.pin.read_level() {
            Ok(level) => {
                if self.failing.swap(false, Ordering::Relaxed) {
                    info!("power-low input readable again");
                }
                level != self.active_low
            }
            Err(e) => {
                if self.failing.swap(true, Ordering::Relaxed) {
                    debug!(label = e.as_label(), error = %e, "power-low input unreadable");
                } else {
                    warn!(label = e.as_label(), error = %e, "power-low input unreadable; assuming voltage ok");
                }
                false
            }
        }
    }
}

impl<F> VoltageMonitor for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn sample_low(&self) -> bool {
        self()
    }
}
