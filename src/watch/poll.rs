//! # Polling directory watcher.
//!
//! ```text
//! tick ──► scan(root) ──► Snapshot ──diff(prev, next)──► [FsChange...] ──► mpsc
//! ```
//!
//! ## Rules
//! - The first scan is a baseline; it reports nothing. Readiness is signalled right after it.
//! - Only regular files are tracked; directories never produce changes.
//! - A file counts as modified when its mtime or length differs between scans.
//! - A scan that fails keeps the previous snapshot (no spurious removals).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::change::{ChangeKind, ChangeSource, FsChange};

/// Per-file fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

/// Files under the root, keyed by full path.
pub type Snapshot = BTreeMap<PathBuf, Stamp>;

/// Watches a directory tree by rescanning it on a fixed interval.
#[derive(Debug, Clone)]
pub struct DirectoryWatcher {
    root: PathBuf,
    every: Duration,
}

impl DirectoryWatcher {
    pub fn new(root: impl Into<PathBuf>, every: Duration) -> Self {
        Self {
            root: root.into(),
            every: every.max(Duration::from_millis(1)),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Recursively collects regular files under `root`.
pub async fn scan(root: &Path) -> io::Result<Snapshot> {
    let mut out = Snapshot::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed between listing and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if meta.is_dir() {
                pending.push(path);
            } else if meta.is_file() {
                let stamp = Stamp {
                    modified: meta.modified().ok(),
                    len: meta.len(),
                };
                out.insert(path, stamp);
            }
        }
    }
    Ok(out)
}

/// Changes that turn `prev` into `next`, removals first.
pub fn diff(prev: &Snapshot, next: &Snapshot) -> Vec<FsChange> {
    let removed = prev
        .keys()
        .filter(|p| !next.contains_key(*p))
        .map(|p| FsChange::new(p.clone(), ChangeKind::Removed));

    let upserted = next.iter().filter_map(|(path, stamp)| match prev.get(path) {
        None => Some(FsChange::new(path.clone(), ChangeKind::Created)),
        Some(old) if old != stamp => Some(FsChange::new(path.clone(), ChangeKind::Modified)),
        Some(_) => None,
    });

    removed.chain(upserted).collect()
}

#[async_trait]
impl ChangeSource for DirectoryWatcher {
    async fn run(
        &self,
        tx: mpsc::Sender<FsChange>,
        ready: oneshot::Sender<()>,
        stop: CancellationToken,
    ) {
        let mut known = match scan(&self.root).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "initial scan failed");
                Snapshot::new()
            }
        };
        let _ = ready.send(());
        let mut failing = false;

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let next = match scan(&self.root).await {
                Ok(next) => {
                    failing = false;
                    next
                }
                Err(e) => {
                    if !failing {
                        warn!(root = %self.root.display(), error = %e, "scan failed");
                    }
                    failing = true;
                    continue;
                }
            };

            for change in diff(&known, &next) {
                debug!(path = %change.path.display(), kind = ?change.kind, "file changed");
                if tx.send(change).await.is_err() {
                    return;
                }
            }
            known = next;
        }
    }

    fn name(&self) -> &'static str {
        "directory-watcher"
    }
}
