//! # Runtime events emitted by the reconciler, orchestrator and supervisor.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Reconcile events**: marker and configuration outcomes (applied, rejected, removed)
//! - **Run events**: acquisition lifecycle (starting, finished, failed)
//! - **Terminal events**: why supervision ended (voltage low, shutdown, stopped)
//! - **Subscriber events**: fan-out health (overflow, panic)
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use rakevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RunFailed)
//!     .with_configuration("defaultconfig")
//!     .with_reason("device_start");
//!
//! assert_eq!(ev.kind, EventKind::RunFailed);
//! assert_eq!(ev.configuration.as_deref(), Some("defaultconfig"));
//! assert_eq!(ev.reason.as_deref(), Some("device_start"));
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Reconcile events ===
    /// Deploy marker reconciled into the run state.
    ///
    /// Sets:
    /// - `configuration`: resolved name (absent when idle)
    /// - `running`, `run_change`: outcome of the reconciliation
    /// - `path`: marker path
    ReconcileApplied,

    /// Deploy marker or configuration could not be used; treated as "no run".
    ///
    /// Sets:
    /// - `path`: marker path
    /// - `reason`: error label and message
    MarkerRejected,

    /// Deploy marker deleted; any active run is stopped.
    ///
    /// Sets:
    /// - `path`: marker path
    /// - `running`: whether a run was active
    DeployRemoved,

    /// Immediate-execute marker consumed.
    ///
    /// Sets:
    /// - `path`: marker path
    ImmediateExecuted,

    // === Run events ===
    /// Acquisition run is about to open the device.
    ///
    /// Sets:
    /// - `configuration`: configuration name
    RunStarting,

    /// Acquisition run ended and the device was stopped.
    ///
    /// Sets:
    /// - `configuration`: configuration name
    /// - `reason`: wait exit (`run_cleared`, `power_low`, `interrupted`)
    RunFinished,

    /// Acquisition run aborted by a device error.
    ///
    /// Sets:
    /// - `configuration`: configuration name
    /// - `reason`: device error label and message
    RunFailed,

    // === Terminal events ===
    /// Power loss observed; supervision will end.
    ///
    /// Sets:
    /// - `reason`: source (`gpio` or `device`)
    VoltageLow,

    /// Shutdown requested (OS signal or caller token).
    ShutdownRequested,

    /// Supervision loop has exited.
    ///
    /// Sets:
    /// - `reason`: termination (`voltage_low` or `shutdown`)
    SupervisorStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: `full` or `closed`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Configuration name, if applicable.
    pub configuration: Option<Arc<str>>,
    /// Human-readable reason (error labels, exit causes, etc.).
    pub reason: Option<Arc<str>>,
    /// Marker path, if applicable.
    pub path: Option<Arc<Path>>,
    /// Subscriber name for fan-out events.
    pub subscriber: Option<&'static str>,
    /// `running` after a reconcile.
    pub running: Option<bool>,
    /// `run_change` after a reconcile.
    pub run_change: Option<bool>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            configuration: None,
            reason: None,
            path: None,
            subscriber: None,
            running: None,
            run_change: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a configuration name.
    #[inline]
    pub fn with_configuration(mut self, name: impl Into<Arc<str>>) -> Self {
        self.configuration = Some(name.into());
        self
    }

    /// Attaches a marker path.
    #[inline]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(Arc::from(path));
        self
    }

    /// Attaches the reconcile outcome.
    #[inline]
    pub fn with_outcome(mut self, running: bool, run_change: bool) -> Self {
        self.running = Some(running);
        self.run_change = Some(run_change);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::RunStarting);
        let b = Event::new(EventKind::RunFinished);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_fill_only_their_fields() {
        let ev = Event::new(EventKind::ReconcileApplied)
            .with_path(Path::new("/trake/configuration/__runfile__.deploy"))
            .with_outcome(true, false);
        assert_eq!(ev.running, Some(true));
        assert_eq!(ev.run_change, Some(false));
        assert!(ev.configuration.is_none());
        assert!(ev.reason.is_none());

        let ov = Event::subscriber_overflow("log", "full");
        assert_eq!(ov.kind, EventKind::SubscriberOverflow);
        assert_eq!(ov.subscriber, Some("log"));
        assert_eq!(ov.reason.as_deref(), Some("full"));
    }
}
