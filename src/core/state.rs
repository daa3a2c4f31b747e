//! # Authoritative run state shared by the reconciler and the control loop.
//!
//! ```text
//! watcher task ──► Reconciler ──apply(intent)──┐
//!                                              ▼
//!                                Mutex<RunState> (single lock)
//!                                              ▲
//! Supervisor loop ──pending_run / finish_run───┤
//! Orchestrator wait ──is_running / latch───────┘
//! ```
//!
//! ## Rules
//! - Every read and write goes through one mutex; callers only ever see whole snapshots.
//! - `running` implies a non-empty name and a loaded configuration.
//! - `voltage_low` only moves false → true and survives [`SharedRunState::finish_run`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::reconcile::ConfigDocument;

/// Snapshot of what should currently be happening.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    /// Configuration to run; empty when no run is intended.
    pub configuration_name: String,
    /// Loaded configuration document (empty when not running).
    pub configuration: ConfigDocument,
    /// A valid named configuration currently resolves.
    pub running: bool,
    /// The last reconciliation changed `(configuration_name, running)`.
    pub run_change: bool,
    /// Sticky power-loss flag.
    pub voltage_low: bool,
}

/// Outcome of reading the deploy marker and configuration store, before it is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunIntent {
    configuration_name: String,
    configuration: ConfigDocument,
    running: bool,
}

impl RunIntent {
    /// The "no run" outcome.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A resolved run of `name` with `configuration`.
    pub fn run(name: impl Into<String>, configuration: ConfigDocument) -> Self {
        let configuration_name = name.into();
        let running = !configuration_name.is_empty();
        Self {
            configuration_name,
            configuration,
            running,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }
}

/// Cloneable handle to the single [`RunState`].
#[derive(Debug, Clone, Default)]
pub struct SharedRunState {
    inner: Arc<Mutex<RunState>>,
}

impl SharedRunState {
    /// Creates the zeroed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // RunState is plain data; a panic while holding the lock cannot leave it half-written
    // in a way that matters more than stopping supervision would.
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    /// Applies a reconciliation result and returns the computed `run_change`.
    pub fn apply(&self, intent: RunIntent) -> bool {
        let mut st = self.lock();
        let run_change =
            st.configuration_name != intent.configuration_name || st.running != intent.running;
        st.configuration_name = intent.configuration_name;
        st.configuration = intent.configuration;
        st.running = intent.running;
        st.run_change = run_change;
        run_change
    }

    /// Forces `running = false` (deploy marker removed). Returns whether a run was active.
    pub fn force_stop(&self) -> bool {
        let mut st = self.lock();
        let was_running = st.running;
        st.running = false;
        was_running
    }

    /// Latches `voltage_low`. Returns `true` on the first latch only.
    pub fn latch_voltage_low(&self) -> bool {
        let mut st = self.lock();
        !std::mem::replace(&mut st.voltage_low, true)
    }

    /// Snapshot of a run that should be started now: `running && run_change`.
    pub fn pending_run(&self) -> Option<RunState> {
        let st = self.lock();
        (st.running && st.run_change).then(|| st.clone())
    }

    /// Resets to the zero state after a run, keeping `voltage_low`.
    pub fn finish_run(&self) {
        let mut st = self.lock();
        let voltage_low = st.voltage_low;
        *st = RunState {
            voltage_low,
            ..RunState::default()
        };
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    #[inline]
    pub fn is_voltage_low(&self) -> bool {
        self.lock().voltage_low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> ConfigDocument {
        ConfigDocument::from_slice(br#"{"averagecount": 5}"#).expect("doc")
    }

    #[test]
    fn first_apply_of_a_run_is_a_change() {
        let state = SharedRunState::new();
        assert!(state.apply(RunIntent::run("defaultconfig", doc())));
        let snap = state.snapshot();
        assert!(snap.running && snap.run_change);
        assert_eq!(snap.configuration_name, "defaultconfig");
        assert_eq!(snap.configuration, doc());
    }

    #[test]
    fn identical_applies_are_not_changes() {
        let state = SharedRunState::new();
        state.apply(RunIntent::run("a", doc()));
        assert!(!state.apply(RunIntent::run("a", doc())));
        assert!(!state.apply(RunIntent::run("a", ConfigDocument::default())));
        assert!(!state.snapshot().run_change);
        assert!(state.pending_run().is_none());
    }

    #[test]
    fn switching_configuration_is_a_change() {
        let state = SharedRunState::new();
        state.apply(RunIntent::run("a", doc()));
        assert!(state.apply(RunIntent::run("b", doc())));
        assert!(state.apply(RunIntent::idle()));
        assert!(!state.apply(RunIntent::idle()));
    }

    #[test]
    fn empty_name_never_runs() {
        let intent = RunIntent::run("", doc());
        assert!(!intent.is_running());
    }

    #[test]
    fn force_stop_clears_running_only() {
        let state = SharedRunState::new();
        state.apply(RunIntent::run("a", doc()));
        assert!(state.force_stop());
        assert!(!state.force_stop());
        let snap = state.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.configuration_name, "a");
    }

    #[test]
    fn voltage_low_is_sticky_across_everything() {
        let state = SharedRunState::new();
        assert!(state.latch_voltage_low());
        assert!(!state.latch_voltage_low());
        state.apply(RunIntent::run("a", doc()));
        state.apply(RunIntent::idle());
        state.force_stop();
        state.finish_run();
        assert!(state.is_voltage_low());
    }

    #[test]
    fn finish_run_returns_to_zero() {
        let state = SharedRunState::new();
        state.apply(RunIntent::run("a", doc()));
        assert!(state.pending_run().is_some());
        state.finish_run();
        assert_eq!(state.snapshot(), RunState::default());
        assert!(state.pending_run().is_none());
    }
}
