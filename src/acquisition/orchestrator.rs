//! # Acquisition orchestrator: one device session per active run.
//!
//! ```text
//! run(RunState)
//!   ├─ Session::open(bus, device)                         (closed on every exit path)
//!   ├─ write RANGEA_0_3..RANGEB_4_7 = uniform(input_range)
//!   ├─ define_sequence(A, B)
//!   ├─ CONFIGURATION |= 0x1c                               (periodic scan)
//!   ├─ start(period, average, folder, UTC file name)
//!   ├─ wait:  loop {
//!   │           !running         → RunCleared
//!   │           voltage_low      → VoltageLatched
//!   │           sleep(wait) | interrupt → Interrupted
//!   │           read_power_low() → PowerLow (latches voltage_low)
//!   │         }
//!   └─ stop()                                              (always, once started)
//! ```
//!
//! ## Rules
//! - Device errors are not retried; they end the run.
//! - An interrupt during the wait is a normal exit, not an error.
//! - The wait is cooperative: flags are checked once per `wait_interval`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::params::{AcquisitionParams, data_file_name};
use crate::core::state::{RunState, SharedRunState};
use crate::device::protocol::CONFIG_PERIODIC_SCAN;
use crate::device::{DeviceDriver, Register, Session, StartRequest};
use crate::error::DeviceError;
use crate::events::{Bus, Event, EventKind};

/// Why the monitoring wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitExit {
    /// `running` was cleared (deploy marker removed).
    RunCleared,
    /// The device reported low power; `voltage_low` was latched.
    PowerLow,
    /// `voltage_low` was already latched by another source.
    VoltageLatched,
    /// Interrupt requested by the caller.
    Interrupted,
}

impl WaitExit {
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitExit::RunCleared => "run_cleared",
            WaitExit::PowerLow => "power_low",
            WaitExit::VoltageLatched => "voltage_latched",
            WaitExit::Interrupted => "interrupted",
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub configuration_name: String,
    pub params: AcquisitionParams,
    pub data_file: String,
    pub exit: WaitExit,
}

/// Sequences device configuration, start, monitoring and stop for one run.
pub struct AcquisitionOrchestrator {
    driver: Arc<dyn DeviceDriver>,
    state: SharedRunState,
    bus: Bus,
    spi_bus: u8,
    spi_device: u8,
    wait_interval: Duration,
    data_folder: PathBuf,
}

impl AcquisitionOrchestrator {
    pub fn new(driver: Arc<dyn DeviceDriver>, state: SharedRunState, bus: Bus) -> Self {
        Self {
            driver,
            state,
            bus,
            spi_bus: 1,
            spi_device: 0,
            wait_interval: Duration::from_secs(10),
            data_folder: PathBuf::from("/trake/data"),
        }
    }

    pub fn with_address(mut self, spi_bus: u8, spi_device: u8) -> Self {
        self.spi_bus = spi_bus;
        self.spi_device = spi_device;
        self
    }

    pub fn with_wait_interval(mut self, every: Duration) -> Self {
        self.wait_interval = every.max(Duration::from_millis(1));
        self
    }

    pub fn with_data_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.data_folder = folder.into();
        self
    }

    /// Runs one acquisition session for `run`, blocking until it ends.
    ///
    /// Publishes `RunStarting`, then `RunFinished` or `RunFailed`.
    pub async fn run(
        &self,
        run: &RunState,
        interrupt: &CancellationToken,
    ) -> Result<RunReport, DeviceError> {
        let name = run.configuration_name.as_str();
        info!(configuration = name, "run starting");
        self.bus
            .publish(Event::new(EventKind::RunStarting).with_configuration(name));

        match self.session(run, interrupt).await {
            Ok(report) => {
                info!(
                    configuration = name,
                    exit = report.exit.as_label(),
                    file = %report.data_file,
                    "run finished"
                );
                self.bus.publish(
                    Event::new(EventKind::RunFinished)
                        .with_configuration(name)
                        .with_reason(report.exit.as_label()),
                );
                Ok(report)
            }
            Err(e) => {
                warn!(configuration = name, label = e.as_label(), error = %e, "run failed");
                self.bus.publish(
                    Event::new(EventKind::RunFailed)
                        .with_configuration(name)
                        .with_reason(format!("{}: {e}", e.as_label())),
                );
                Err(e)
            }
        }
    }

    async fn session(
        &self,
        run: &RunState,
        interrupt: &CancellationToken,
    ) -> Result<RunReport, DeviceError> {
        let params = AcquisitionParams::resolve(&run.configuration, &self.data_folder);
        let mut session = Session::open(self.driver.as_ref(), self.spi_bus, self.spi_device)?;

        let ranges = params.input_range.uniform_register();
        for register in Register::RANGES {
            session.write_register(register.address(), ranges)?;
        }

        session.define_sequence(&params.channels.a, &params.channels.b)?;
        let config = Register::Configuration.address();
        let current = session.read_register(config)?;
        session.write_register(config, current | CONFIG_PERIODIC_SCAN)?;

        let data_file = data_file_name(Utc::now());
        session.start(StartRequest {
            sample_period_ms: params.sample_period_ms,
            average_count: params.average_count,
            output_dir: &params.data_folder,
            output_file: &data_file,
        })?;

        let waited = self.wait(&mut session, interrupt).await;
        let stopped = session.stop();
        drop(session);

        let exit = waited?;
        stopped?;
        Ok(RunReport {
            configuration_name: run.configuration_name.clone(),
            params,
            data_file,
            exit,
        })
    }

    async fn wait(
        &self,
        session: &mut Session,
        interrupt: &CancellationToken,
    ) -> Result<WaitExit, DeviceError> {
        loop {
            if !self.state.is_running() {
                return Ok(WaitExit::RunCleared);
            }
            if self.state.is_voltage_low() {
                return Ok(WaitExit::VoltageLatched);
            }

            tokio::select! {
                _ = interrupt.cancelled() => return Ok(WaitExit::Interrupted),
                _ = tokio::time::sleep(self.wait_interval) => {}
            }

            if session.read_power_low()? {
                if self.state.latch_voltage_low() {
                    warn!("device reports power low");
                    self.bus
                        .publish(Event::new(EventKind::VoltageLow).with_reason("device"));
                }
                return Ok(WaitExit::PowerLow);
            }
        }
    }
}
