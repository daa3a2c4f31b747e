//! # Device collaborator interface and scoped session ownership.
//!
//! The register-level driver is an external collaborator. The runtime only
//! sees two seams:
//! - [`DeviceDriver`] opens a session on `(bus, device)`;
//! - [`DeviceSession`] offers the register, sequencing and acquisition calls.
//!
//! [`Session`] owns an open session and closes it when dropped, so a session
//! is released on every exit path of a run (error, low voltage, interrupt).
//!
//! ```text
//! Session::open(driver, bus, dev) ──► Box<dyn DeviceSession>
//!        │  write_register / define_sequence / start / read_power_low / stop
//!        ▼
//!      drop(Session) ──► DeviceSession::close()
//! ```

use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::debug;

use crate::error::DeviceError;

/// Parameters of a periodic acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest<'a> {
    /// Sample period in whole milliseconds.
    pub sample_period_ms: u32,
    /// Number of conversions averaged per recorded sample.
    pub average_count: u32,
    /// Directory receiving the data file.
    pub output_dir: &'a Path,
    /// Data file name inside `output_dir`.
    pub output_file: &'a str,
}

/// Opens device sessions.
pub trait DeviceDriver: Send + Sync + 'static {
    /// Opens a session on SPI `bus`, chip-select `device`.
    fn open(&self, bus: u8, device: u8) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

/// An open device session. Exclusively owned by one run.
pub trait DeviceSession: Send {
    fn write_register(&mut self, address: u8, value: u16) -> Result<(), DeviceError>;

    fn read_register(&mut self, address: u8) -> Result<u16, DeviceError>;

    /// Reads several registers in order.
    fn read_registers(&mut self, addresses: &[u8]) -> Result<Vec<u16>, DeviceError> {
        addresses
            .iter()
            .map(|&address| self.read_register(address))
            .collect()
    }

    /// Programs the sequencer with A/B channel pairs.
    ///
    /// Both slices must have the same length; the device rejects anything else.
    fn define_sequence(&mut self, a: &[u8], b: &[u8]) -> Result<(), DeviceError>;

    /// Starts periodic acquisition into `output_dir/output_file`.
    fn start(&mut self, req: StartRequest<'_>) -> Result<(), DeviceError>;

    /// Stops periodic acquisition. Stopping an idle session is not an error.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Returns `true` when the device reports imminent power loss.
    fn read_power_low(&mut self) -> Result<bool, DeviceError>;

    /// Releases the session. Called exactly once, by [`Session`]'s drop.
    fn close(&mut self);
}

/// Scoped owner of an open [`DeviceSession`].
///
/// Dereferences to the session; closes it on drop.
pub struct Session {
    inner: Box<dyn DeviceSession>,
    bus: u8,
    device: u8,
}

impl Session {
    /// Opens a session through `driver`.
    pub fn open(driver: &dyn DeviceDriver, bus: u8, device: u8) -> Result<Self, DeviceError> {
        let inner = driver.open(bus, device)?;
        debug!(bus, device, "device session opened");
        Ok(Self { inner, bus, device })
    }
}

impl Deref for Session {
    type Target = dyn DeviceSession;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.close();
        debug!(bus = self.bus, device = self.device, "device session closed");
    }
}
