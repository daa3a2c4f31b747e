//! File change notification for the watched configuration directory.
//!
//! - [`ChangeSource`]: the capability the supervisor depends on;
//! - [`DirectoryWatcher`]: polling implementation over `tokio::fs`.

mod change;
mod poll;

pub use change::{ChangeKind, ChangeSource, FsChange};
pub use poll::{DirectoryWatcher, Snapshot, Stamp, diff, scan};
