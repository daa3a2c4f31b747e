//! # rakevisor
//!
//! **Rakevisor** supervises an unattended sensor-rake acquisition station. Operators
//! express intent by dropping marker files and named JSON configurations into a
//! watched directory; rakevisor reconciles that into one authoritative run state,
//! starts and stops device sessions accordingly, and shuts down when supply voltage drops.
//!
//! ## Architecture
//! ```text
//!   watched directory                         power-low input
//!   ┌──────────────────────────┐              ┌──────────────┐
//!   │ __runfile__.deploy       │              │ GPIO (sysfs) │
//!   │ __immediate__.execute    │              └──────┬───────┘
//!   │ <name>.json              │                     │ sample_low()
//!   └────────────┬─────────────┘                     │
//!                ▼ FsChange                          │
//!      ┌───────────────────┐   apply / force_stop    │
//!      │    Reconciler     │───────────────┐         │
//!      │ (marker + store)  │               ▼         ▼
//!      └───────────────────┘     ┌───────────────────────────────┐
//!                                │  SharedRunState (one mutex)   │
//!                                └──────────────┬────────────────┘
//!                                               │ pending_run / finish_run / latch
//!                                ┌──────────────▼────────────────┐
//!                                │ Supervisor (poll_interval loop)│
//!                                └──────────────┬────────────────┘
//!                                               │ run(RunState).await
//!                                ┌──────────────▼────────────────┐
//!                                │    AcquisitionOrchestrator    │
//!                                │ ranges → sequence → start →   │
//!                                │ wait(running, power) → stop   │
//!                                └──────────────┬────────────────┘
//!                                               ▼
//!                                      DeviceDriver / Session
//!
//!   everything above ── publish(Event) ──► Bus ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Control loop, startup reconcile, voltage-low termination.    | [`Supervisor`], [`Termination`]             |
//! | **Reconciliation**| Marker + configuration store → run state.                    | [`Reconciler`], [`ConfigurationStore`]      |
//! | **Acquisition**   | Device configuration and run monitoring.                     | [`AcquisitionOrchestrator`], [`DeviceDriver`] |
//! | **Capabilities**  | File changes and the power-low input.                        | [`ChangeSource`], [`VoltageMonitor`]        |
//! | **Subscriber API**| Hook into runtime events.                                    | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors with stable labels.                             | [`RuntimeError`], [`DeviceError`]           |
//! | **Configuration** | Centralized runtime settings.                                | [`Config`]                                  |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use rakevisor::{Config, LogWriter, SimulatedDriver, Subscribe, Supervisor, shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let sup = Supervisor::builder(cfg, Arc::new(SimulatedDriver::new()))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let termination = sup.run(shutdown::cancel_on_signal()).await?;
//!     println!("stopped: {}", termination.as_label());
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod subscribers;

pub mod acquisition;
pub mod deploy;
pub mod device;
pub mod reconcile;
pub mod voltage;
pub mod watch;

// ---- Public re-exports ----

pub use crate::core::{
    Config, RunIntent, RunState, SharedRunState, Supervisor, SupervisorBuilder, Termination,
    shutdown,
};
pub use error::{DeviceError, PinError, ReconcileError, RuntimeError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};

pub use acquisition::{AcquisitionOrchestrator, AcquisitionParams, RunReport, WaitExit};
pub use device::{DeviceDriver, DeviceSession, SimulatedDriver};
pub use reconcile::{ConfigDocument, ConfigurationStore, Reconciler};
pub use voltage::{InputPin, PinVoltageMonitor, SysfsPin, VoltageMonitor};
pub use watch::{ChangeKind, ChangeSource, DirectoryWatcher, FsChange};
