//! # Reconciler: marker + store → run state.
//!
//! ```text
//! FsChange ──► MarkerKind::of(path)
//!                ├─ Deploy, Created/Modified ─► read marker ─► store.load(name) ─► RunIntent ─► state.apply
//!                │                                  └──── any error ───────────► RunIntent::idle + MarkerRejected
//!                ├─ Deploy, Removed ──────────► state.force_stop (no file is read)
//!                ├─ Immediate, Created/Modified ► remove marker + ImmediateExecuted
//!                └─ anything else ────────────► ignored
//! ```
//!
//! ## Rules
//! - Errors never leave this module; they become "no run" plus a `MarkerRejected`
//!   event, which `LogWriter` renders.
//! - `run_change` is computed under the state lock, against the values being replaced.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::marker::{DEPLOY_MARKER, DeployMarker, MarkerKind};
use super::store::ConfigurationStore;
use crate::core::state::{RunIntent, SharedRunState};
use crate::error::ReconcileError;
use crate::events::{Bus, Event, EventKind};
use crate::watch::{ChangeKind, FsChange};

/// Result of handling one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Marker resolved (or not) and was applied.
    Applied { running: bool, run_change: bool },
    /// Marker or configuration was unusable; "no run" was applied.
    Rejected { run_change: bool },
    /// Deploy marker removed.
    Stopped { was_running: bool },
    /// Immediate-execute marker consumed.
    ImmediateExecuted,
    /// Not a marker, or a change that needs no action.
    Ignored,
}

/// Turns file changes into [`SharedRunState`] updates.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: ConfigurationStore,
    state: SharedRunState,
    bus: Bus,
}

impl Reconciler {
    pub fn new(store: ConfigurationStore, state: SharedRunState, bus: Bus) -> Self {
        Self {
            store,
            state,
            bus,
        }
    }

    /// Deploy marker location at the store root.
    pub fn deploy_marker_path(&self) -> PathBuf {
        self.store.dir().join(DEPLOY_MARKER)
    }

    /// Dispatches one change.
    pub fn handle(&self, change: &FsChange) -> Outcome {
        match (MarkerKind::of(&change.path), change.kind) {
            (MarkerKind::Deploy, ChangeKind::Removed) => self.remove(&change.path),
            (MarkerKind::Deploy, _) => self.reconcile(&change.path),
            (MarkerKind::Immediate, ChangeKind::Created | ChangeKind::Modified) => {
                self.execute_immediate(&change.path)
            }
            _ => Outcome::Ignored,
        }
    }

    /// Reconciles the deploy marker at `marker`.
    pub fn reconcile(&self, marker: &Path) -> Outcome {
        match self.resolve(marker) {
            Ok(intent) => {
                let running = intent.is_running();
                let name = intent.configuration_name().to_owned();
                let run_change = self.state.apply(intent);
                if run_change {
                    info!(configuration = %name, running, "run state changed");
                } else {
                    debug!(configuration = %name, running, "reconciled without change");
                }
                let mut ev = Event::new(EventKind::ReconcileApplied)
                    .with_path(marker)
                    .with_outcome(running, run_change);
                if !name.is_empty() {
                    ev = ev.with_configuration(name);
                }
                self.bus.publish(ev);
                Outcome::Applied {
                    running,
                    run_change,
                }
            }
            Err(err) => {
                let run_change = self.state.apply(RunIntent::idle());
                self.bus.publish(
                    Event::new(EventKind::MarkerRejected)
                        .with_path(marker)
                        .with_reason(format!("{}: {err}", err.as_label())),
                );
                Outcome::Rejected { run_change }
            }
        }
    }

    /// Reconciles a deploy marker that already exists at startup.
    pub fn reconcile_existing(&self) -> Option<Outcome> {
        let marker = self.deploy_marker_path();
        marker.is_file().then(|| self.reconcile(&marker))
    }

    fn resolve(&self, marker: &Path) -> Result<RunIntent, ReconcileError> {
        let bytes = std::fs::read(marker).map_err(|source| ReconcileError::MarkerIo {
            path: marker.to_path_buf(),
            source,
        })?;
        let DeployMarker { configuration_name } =
            DeployMarker::from_slice(&bytes).map_err(|source| ReconcileError::MarkerParse {
                path: marker.to_path_buf(),
                source,
            })?;
        let configuration = self.store.load(&configuration_name)?;
        Ok(RunIntent::run(configuration_name, configuration))
    }

    fn remove(&self, marker: &Path) -> Outcome {
        let was_running = self.state.force_stop();
        info!(marker = %marker.display(), was_running, "deploy marker removed");
        self.bus.publish(
            Event::new(EventKind::DeployRemoved)
                .with_path(marker)
                .with_outcome(false, was_running),
        );
        Outcome::Stopped { was_running }
    }

    fn execute_immediate(&self, marker: &Path) -> Outcome {
        match std::fs::remove_file(marker) {
            Ok(()) => {}
            // Already consumed by an earlier change.
            Err(e) if e.kind() == ErrorKind::NotFound => return Outcome::Ignored,
            Err(e) => {
                warn!(marker = %marker.display(), error = %e, "cannot remove immediate marker");
            }
        }
        info!(marker = %marker.display(), "immediate marker executed");
        self.bus
            .publish(Event::new(EventKind::ImmediateExecuted).with_path(marker));
        Outcome::ImmediateExecuted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::IMMEDIATE_MARKER;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        state: SharedRunState,
        bus: Bus,
        reconciler: Reconciler,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("tempdir");
            let state = SharedRunState::new();
            let bus = Bus::new(64);
            let reconciler =
                Reconciler::new(ConfigurationStore::new(dir.path()), state.clone(), bus.clone());
            Self {
                dir,
                state,
                bus,
                reconciler,
            }
        }

        fn write(&self, name: &str, body: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, body).expect("write");
            path
        }

        fn deploy(&self, body: &str) -> Outcome {
            let path = self.write(DEPLOY_MARKER, body);
            self.reconciler
                .handle(&FsChange::new(path, ChangeKind::Modified))
        }
    }

    #[test]
    fn resolves_named_configuration() {
        let fx = Fixture::new();
        fx.write("defaultconfig.json", "{}");
        let out = fx.deploy(r#"{"configurationName":"defaultconfig"}"#);

        assert_eq!(
            out,
            Outcome::Applied {
                running: true,
                run_change: true
            }
        );
        let snap = fx.state.snapshot();
        assert!(snap.running);
        assert_eq!(snap.configuration_name, "defaultconfig");
        assert!(snap.configuration.is_empty());
    }

    #[test]
    fn missing_configuration_is_no_run() {
        let fx = Fixture::new();
        let out = fx.deploy(r#"{"configurationName":"missingconfig"}"#);
        assert_eq!(out, Outcome::Rejected { run_change: false });
        let snap = fx.state.snapshot();
        assert!(!snap.running);
        assert!(snap.configuration_name.is_empty());
    }

    #[test]
    fn malformed_markers_never_run() {
        let fx = Fixture::new();
        fx.write("good.json", "{}");
        fx.write("list.json", "[1]");
        for body in [
            "",
            "not json",
            "{}",
            r#"{"configurationName": 5}"#,
            r#"["good"]"#,
            r#"{"configurationName":"list"}"#,
            r#"{"configurationName":"../good"}"#,
            r#"{"configurationName":""}"#,
        ] {
            fx.deploy(r#"{"configurationName":"good"}"#);
            assert!(fx.state.is_running());
            let out = fx.deploy(body);
            assert!(
                matches!(out, Outcome::Rejected { run_change: true }),
                "body {body:?} gave {out:?}"
            );
            assert!(!fx.state.is_running());
        }
    }

    #[test]
    fn rejection_is_published_with_label() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        fx.deploy(r#"{"configurationName":"nope"}"#);
        let ev = rx.try_recv().expect("event");
        assert_eq!(ev.kind, EventKind::MarkerRejected);
        assert!(ev.reason.as_deref().is_some_and(|r| r.starts_with("store_not_found")));
        assert!(rx.try_recv().is_err(), "one event per rejection");
    }

    #[test]
    fn repeated_reconciliation_is_not_a_change() {
        let fx = Fixture::new();
        fx.write("a.json", r#"{"averagecount": 3}"#);
        let body = r#"{"configurationName":"a"}"#;
        assert!(matches!(fx.deploy(body), Outcome::Applied { run_change: true, .. }));
        for _ in 0..3 {
            assert_eq!(
                fx.deploy(body),
                Outcome::Applied {
                    running: true,
                    run_change: false
                }
            );
        }
        assert!(fx.state.pending_run().is_none());
    }

    #[test]
    fn removal_stops_without_reading_files() {
        let fx = Fixture::new();
        fx.write("a.json", "{}");
        fx.deploy(r#"{"configurationName":"a"}"#);
        // Nothing exists at the reported path or in the store any more.
        std::fs::remove_dir_all(fx.dir.path()).expect("remove dir");

        let gone = fx.dir.path().join(DEPLOY_MARKER);
        let out = fx.reconciler.handle(&FsChange::new(&gone, ChangeKind::Removed));
        assert_eq!(out, Outcome::Stopped { was_running: true });
        assert!(!fx.state.is_running());

        let out = fx.reconciler.handle(&FsChange::new(&gone, ChangeKind::Removed));
        assert_eq!(out, Outcome::Stopped { was_running: false });
    }

    #[test]
    fn immediate_marker_is_consumed_once() {
        let fx = Fixture::new();
        let path = fx.write(IMMEDIATE_MARKER, "");
        let out = fx.reconciler.handle(&FsChange::new(&path, ChangeKind::Created));
        assert_eq!(out, Outcome::ImmediateExecuted);
        assert!(!path.exists());

        assert_eq!(
            fx.reconciler.handle(&FsChange::new(&path, ChangeKind::Removed)),
            Outcome::Ignored
        );
        assert_eq!(
            fx.reconciler.handle(&FsChange::new(&path, ChangeKind::Modified)),
            Outcome::Ignored
        );
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let fx = Fixture::new();
        let path = fx.write("a.json", "{}");
        for kind in [ChangeKind::Created, ChangeKind::Modified, ChangeKind::Removed] {
            assert_eq!(
                fx.reconciler.handle(&FsChange::new(&path, kind)),
                Outcome::Ignored
            );
        }
        assert_eq!(fx.state.snapshot(), Default::default());
    }

    #[test]
    fn reconciliation_never_clears_voltage_low() {
        let fx = Fixture::new();
        fx.write("a.json", "{}");
        fx.state.latch_voltage_low();
        fx.deploy(r#"{"configurationName":"a"}"#);
        fx.deploy("garbage");
        fx.reconciler.handle(&FsChange::new(
            fx.dir.path().join(DEPLOY_MARKER),
            ChangeKind::Removed,
        ));
        assert!(fx.state.is_voltage_low());
    }

    #[test]
    fn existing_marker_is_reconciled_at_startup() {
        let fx = Fixture::new();
        assert_eq!(fx.reconciler.reconcile_existing(), None);
        fx.write("a.json", "{}");
        fx.write(DEPLOY_MARKER, r#"{"configurationName":"a"}"#);
        assert_eq!(
            fx.reconciler.reconcile_existing(),
            Some(Outcome::Applied {
                running: true,
                run_change: true
            })
        );
    }
}
