//! # LogWriter: renders events through `tracing`.
//!
//! ## Example output
//! ```text
//! INFO  event: kind=ReconcileApplied configuration=defaultconfig running=true run_change=true
//! INFO  event: kind=RunStarting configuration=defaultconfig
//! WARN  event: kind=RunFailed configuration=defaultconfig reason="device_start: ..."
//! WARN  event: kind=VoltageLow reason=gpio
//! ```
//!
//! `MarkerRejected` is logged at `warn` only with diagnostics enabled and at
//! `debug` otherwise, so unattended stations stay quiet about bad markers.

use async_trait::async_trait;
use tracing::{Level, debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter {
    diagnostics: bool,
}

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs rejected markers at `warn` instead of `debug`.
    #[must_use]
    pub fn with_diagnostics(mut self, on: bool) -> Self {
        self.diagnostics = on;
        self
    }

    fn level(&self, kind: EventKind) -> Level {
        match kind {
            EventKind::MarkerRejected if self.diagnostics => Level::WARN,
            EventKind::MarkerRejected => Level::DEBUG,
            EventKind::RunFailed
            | EventKind::VoltageLow
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => Level::WARN,
            _ => Level::INFO,
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let configuration = e.configuration.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        let path = e.path.as_deref().map(|p| p.display().to_string()).unwrap_or_default();
        let subscriber = e.subscriber.unwrap_or("");

        macro_rules! emit {
            ($mac:ident) => {
                $mac!(
                    seq = e.seq,
                    kind = ?e.kind,
                    configuration,
                    reason,
                    path = %path,
                    subscriber,
                    running = ?e.running,
                    run_change = ?e.run_change,
                    "event"
                )
            };
        }

        let level = self.level(e.kind);
        if level == Level::WARN {
            emit!(warn);
        } else if level == Level::DEBUG {
            emit!(debug);
        } else {
            emit!(info);
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_raise_marker_rejections() {
        assert_eq!(LogWriter::new().level(EventKind::MarkerRejected), Level::DEBUG);
        assert_eq!(
            LogWriter::new()
                .with_diagnostics(true)
                .level(EventKind::MarkerRejected),
            Level::WARN
        );
        assert_eq!(LogWriter::new().level(EventKind::RunStarting), Level::INFO);
        assert_eq!(LogWriter::new().level(EventKind::VoltageLow), Level::WARN);
    }
}
