//! # Supervisor: control loop over the shared run state.
//!
//! The [`Supervisor`] owns the event bus, the [`SubscriberSet`], the change
//! source feeding the [`Reconciler`], the [`VoltageMonitor`] and the
//! [`AcquisitionOrchestrator`]. It is built with
//! [`SupervisorBuilder`](crate::SupervisorBuilder).
//!
//! ## High-level architecture
//! ```text
//! ChangeSource task ──FsChange──► mpsc ──► reconcile pump ──► Reconciler ──► SharedRunState
//!                                                                               ▲
//! control loop (every poll_interval):                                           │
//!   1. voltage_low?               → Terminated(VoltageLow)                      │
//!   2. shutdown cancelled?        → Terminated(Shutdown)                        │
//!   3. running && run_change?     → orchestrator.run(..).await, finish_run ─────┤
//!   4. monitor.sample_low()       → latch voltage_low ──────────────────────────┘
//!
//! Event flow:
//!   Reconciler / Orchestrator / loop ── publish ──► Bus ──► listener ──► SubscriberSet
//!
//! Teardown:
//!   stop ChangeSource ─► join pump ─► publish SupervisorStopped ─► drain listener ─► shutdown subscribers
//! ```
//!
//! ## Rules
//! - Only one run is ever in flight: the loop awaits the orchestrator.
//! - A latched voltage-low is observed on the next iteration; runs are never preempted by the loop.
//! - Per-iteration failures are absorbed; only startup faults are returned as [`RuntimeError`].

use std::io;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::Config;
use super::state::SharedRunState;
use crate::acquisition::AcquisitionOrchestrator;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::reconcile::Reconciler;
use crate::subscribers::SubscriberSet;
use crate::voltage::VoltageMonitor;
use crate::watch::ChangeSource;

/// Why supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Supply voltage dropped (GPIO input or device report).
    VoltageLow,
    /// The caller's shutdown token was cancelled.
    Shutdown,
}

impl Termination {
    pub fn as_label(&self) -> &'static str {
        match self {
            Termination::VoltageLow => "voltage_low",
            Termination::Shutdown => "shutdown",
        }
    }
}

/// Drives reconciliation, acquisition runs and voltage supervision.
pub struct Supervisor {
    pub(super) cfg: Config,
    pub(super) bus: Bus,
    pub(super) state: SharedRunState,
    pub(super) subs: SubscriberSet,
    pub(super) reconciler: Reconciler,
    pub(super) orchestrator: AcquisitionOrchestrator,
    pub(super) monitor: Arc<dyn VoltageMonitor>,
    pub(super) source: Arc<dyn ChangeSource>,
}

impl Supervisor {
    /// Event bus; subscribe before calling [`run`](Self::run) to observe every event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Shared run state handle.
    pub fn state(&self) -> &SharedRunState {
        &self.state
    }

    /// Runs until voltage goes low or `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<Termination, RuntimeError> {
        let Supervisor {
            cfg,
            bus,
            state,
            subs,
            reconciler,
            orchestrator,
            monitor,
            source,
        } = self;

        let listener_stop = CancellationToken::new();
        let subs = Arc::new(subs);
        let listener = subscriber_listener(&bus, Arc::clone(&subs), listener_stop.clone());

        if let Err(e) = check_watch_dir(&cfg).await {
            warn!(label = e.as_label(), error = %e, "cannot supervise");
            stop_listener(listener, listener_stop, subs).await;
            return Err(e);
        }

        let watch_stop = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(cfg.change_queue_clamped());
        let (ready_tx, ready_rx) = oneshot::channel();
        let watcher = {
            let source = Arc::clone(&source);
            let stop = watch_stop.clone();
            tokio::spawn(async move { source.run(tx, ready_tx, stop).await })
        };
        let pump = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move {
                while let Some(change) = rx.recv().await {
                    let outcome = reconciler.handle(&change);
                    debug!(path = %change.path.display(), ?outcome, "change handled");
                }
            })
        };
        // A marker written before the baseline must be seen by the startup reconcile.
        tokio::select! {
            _ = ready_rx => {}
            _ = shutdown.cancelled() => {}
        }
        info!(dir = %cfg.watch_dir.display(), source = source.name(), "watching");

        if let Some(outcome) = reconciler.reconcile_existing() {
            info!(?outcome, "existing deploy marker reconciled");
        }

        let mut ticker = interval(cfg.poll_interval_clamped());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let termination = loop {
            if state.is_voltage_low() {
                break Termination::VoltageLow;
            }
            if shutdown.is_cancelled() {
                info!("shutdown requested");
                bus.publish(Event::new(EventKind::ShutdownRequested));
                break Termination::Shutdown;
            }

            if let Some(run) = state.pending_run() {
                // Failures are logged and published by the orchestrator.
                let _ = orchestrator.run(&run, &shutdown).await;
                state.finish_run();
            }

            if monitor.sample_low() && state.latch_voltage_low() {
                warn!("power-low input asserted");
                bus.publish(Event::new(EventKind::VoltageLow).with_reason("gpio"));
            }

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = ticker.tick() => {}
            }
        };

        watch_stop.cancel();
        if let Err(e) = watcher.await {
            warn!(error = %e, "change source task failed");
        }
        if let Err(e) = pump.await {
            warn!(error = %e, "reconcile task failed");
        }
        drop(monitor);

        info!(termination = termination.as_label(), "supervisor stopped");
        bus.publish(Event::new(EventKind::SupervisorStopped).with_reason(termination.as_label()));
        stop_listener(listener, listener_stop, subs).await;
        Ok(termination)
    }
}

async fn check_watch_dir(cfg: &Config) -> Result<(), RuntimeError> {
    let meta = tokio::fs::metadata(&cfg.watch_dir)
        .await
        .map_err(|source| RuntimeError::WatchDirectory {
            path: cfg.watch_dir.clone(),
            source,
        })?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(RuntimeError::WatchDirectory {
            path: cfg.watch_dir.clone(),
            source: io::Error::other("not a directory"),
        })
    }
}

/// Forwards bus events to the subscriber set until stopped, then drains what is queued.
fn subscriber_listener(
    bus: &Bus,
    set: Arc<SubscriberSet>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = stop.cancelled() => break,
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
    })
}

async fn stop_listener(listener: JoinHandle<()>, stop: CancellationToken, subs: Arc<SubscriberSet>) {
    stop.cancel();
    if let Err(e) = listener.await {
        warn!(error = %e, "event listener failed");
    }
    match Arc::try_unwrap(subs) {
        Ok(set) => set.shutdown().await,
        Err(_) => debug!("subscriber set still shared; workers end with the runtime"),
    }
}
