use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single file-level change under the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FsChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Capability that reports file changes under a directory.
///
/// Implementations run until `stop` is cancelled or the receiver is dropped,
/// and must not report directory entries. `ready` is signalled once every
/// later change will be reported; the supervisor reconciles existing markers
/// only after that point.
#[async_trait]
pub trait ChangeSource: Send + Sync + 'static {
    async fn run(
        &self,
        tx: mpsc::Sender<FsChange>,
        ready: oneshot::Sender<()>,
        stop: CancellationToken,
    );

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<T: ChangeSource + ?Sized> ChangeSource for Arc<T> {
    async fn run(
        &self,
        tx: mpsc::Sender<FsChange>,
        ready: oneshot::Sender<()>,
        stop: CancellationToken,
    ) {
        (**self).run(tx, ready, stop).await;
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
