//! Operator helpers for the deploy marker.
//!
//! The marker is written to a temporary sibling and renamed into place, so a
//! watcher never observes a half-written body.

use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::reconcile::{DEPLOY_MARKER, DeployMarker};

/// Writes `<dir>/__runfile__.deploy` naming `configuration`. Returns the marker path.
pub fn write_deploy_marker(dir: &Path, configuration: &str) -> io::Result<PathBuf> {
    let marker = dir.join(DEPLOY_MARKER);
    let staging = dir.join(format!(".{DEPLOY_MARKER}.tmp"));
    let body = serde_json::to_vec(&DeployMarker::new(configuration)).map_err(io::Error::other)?;

    std::fs::write(&staging, body)?;
    std::fs::rename(&staging, &marker)?;
    info!(marker = %marker.display(), configuration, "deploy marker written");
    Ok(marker)
}

/// Removes the deploy marker. Returns `false` when there was none.
pub fn remove_deploy_marker(dir: &Path) -> io::Result<bool> {
    let marker = dir.join(DEPLOY_MARKER);
    match std::fs::remove_file(&marker) {
        Ok(()) => {
            info!(marker = %marker.display(), "deploy marker removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn written_marker_parses_back() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_deploy_marker(dir.path(), "defaultconfig").expect("write");
        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(
            DeployMarker::from_slice(&bytes).expect("parse"),
            DeployMarker::new("defaultconfig")
        );
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("list")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(DEPLOY_MARKER)]);
    }

    #[test]
    fn removal_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        write_deploy_marker(dir.path(), "a").expect("write");
        assert!(remove_deploy_marker(dir.path()).expect("remove"));
        assert!(!remove_deploy_marker(dir.path()).expect("remove again"));
    }
}
