//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config, driver)`
//! 2. **Run defaults**: the orchestrator receives `data_folder` as the fallback output directory
//!
//! ## Sentinel values
//! - zero durations are clamped to 1 ms by the accessors
//! - `bus_capacity = 0` / `change_queue = 0` are clamped to 1

use std::path::PathBuf;
use std::time::Duration;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `watch_dir`: watched directory; also the configuration store root
/// - `poll_interval`: control loop period
/// - `wait_interval`: orchestrator monitoring increment while a run is active
/// - `scan_interval`: polling watcher rescan period
/// - `data_folder`: output directory when the configuration has no `datafolder`
/// - `spi_bus` / `spi_device`: device session address
/// - `power_low_pin` / `power_low_active_low` / `gpio_root`: low-voltage input
/// - `diagnostics`: log absorbed marker/config errors at `warn`
/// - `bus_capacity`: event bus ring buffer size
/// - `change_queue`: watcher → reconciler queue depth
///
/// ## Notes
/// All fields are public for flexibility. Prefer the accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    pub watch_dir: PathBuf,
    pub poll_interval: Duration,
    pub wait_interval: Duration,
    pub scan_interval: Duration,
    pub data_folder: PathBuf,
    pub spi_bus: u8,
    pub spi_device: u8,
    pub power_low_pin: u32,
    pub power_low_active_low: bool,
    pub gpio_root: PathBuf,
    pub diagnostics: bool,
    pub bus_capacity: usize,
    pub change_queue: usize,
}

impl Config {
    #[inline]
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(MIN_PERIOD)
    }

    #[inline]
    pub fn wait_interval_clamped(&self) -> Duration {
        self.wait_interval.max(MIN_PERIOD)
    }

    #[inline]
    pub fn scan_interval_clamped(&self) -> Duration {
        self.scan_interval.max(MIN_PERIOD)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn change_queue_clamped(&self) -> usize {
        self.change_queue.max(1)
    }
}

impl Default for Config {
    /// Field-station defaults: `/trake/configuration`, 100 ms loop, 10 s run checks,
    /// SPI 1.0, power-low on BCM 27 (active low).
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("/trake/configuration"),
            poll_interval: Duration::from_millis(100),
            wait_interval: Duration::from_secs(10),
            scan_interval: Duration::from_millis(250),
            data_folder: PathBuf::from("/trake/data"),
            spi_bus: 1,
            spi_device: 0,
            power_low_pin: 27,
            power_low_active_low: true,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            diagnostics: false,
            bus_capacity: 1024,
            change_queue: 64,
        }
    }
}
