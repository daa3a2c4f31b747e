use std::sync::Arc;

use super::config::Config;
use super::state::SharedRunState;
use super::supervisor::Supervisor;
use crate::acquisition::AcquisitionOrchestrator;
use crate::device::DeviceDriver;
use crate::events::Bus;
use crate::reconcile::{ConfigurationStore, Reconciler};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::voltage::{PinVoltageMonitor, SysfsPin, VoltageMonitor};
use crate::watch::{ChangeSource, DirectoryWatcher};

/// Builder for constructing a [`Supervisor`].
///
/// Defaults: [`DirectoryWatcher`] on `cfg.watch_dir` and a [`PinVoltageMonitor`]
/// over the sysfs pin `cfg.power_low_pin`.
pub struct SupervisorBuilder {
    cfg: Config,
    driver: Arc<dyn DeviceDriver>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    monitor: Option<Arc<dyn VoltageMonitor>>,
    source: Option<Arc<dyn ChangeSource>>,
}

impl Supervisor {
    /// Starts building a supervisor that runs acquisitions on `driver`.
    pub fn builder(cfg: Config, driver: Arc<dyn DeviceDriver>) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, driver)
    }
}

impl SupervisorBuilder {
    pub fn new(cfg: Config, driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            cfg,
            driver,
            subscribers: Vec::new(),
            monitor: None,
            source: None,
        }
    }

    /// Sets event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the low-voltage input.
    pub fn with_monitor(mut self, monitor: impl VoltageMonitor) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self
    }

    /// Replaces the file change source.
    pub fn with_change_source(mut self, source: impl ChangeSource) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Builds the supervisor. Must be called within a Tokio runtime (subscriber workers are spawned).
    pub fn build(self) -> Supervisor {
        let cfg = self.cfg;
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let state = SharedRunState::new();
        let subs = SubscriberSet::new(self.subscribers, bus.clone());

        let reconciler = Reconciler::new(
            ConfigurationStore::new(&cfg.watch_dir),
            state.clone(),
            bus.clone(),
        );

        let orchestrator = AcquisitionOrchestrator::new(self.driver, state.clone(), bus.clone())
            .with_address(cfg.spi_bus, cfg.spi_device)
            .with_wait_interval(cfg.wait_interval_clamped())
            .with_data_folder(&cfg.data_folder);

        let monitor: Arc<dyn VoltageMonitor> = match self.monitor {
            Some(monitor) => monitor,
            None => Arc::new(PinVoltageMonitor::new(
                SysfsPin::new(&cfg.gpio_root, cfg.power_low_pin),
                cfg.power_low_active_low,
            )),
        };
        let source: Arc<dyn ChangeSource> = match self.source {
            Some(source) => source,
            None => Arc::new(DirectoryWatcher::new(
                &cfg.watch_dir,
                cfg.scan_interval_clamped(),
            )),
        };

        Supervisor {
            cfg,
            bus,
            state,
            subs,
            reconciler,
            orchestrator,
            monitor,
            source,
        }
    }
}
