//! # Configuration store: `<name>` → `<dir>/<name>.json`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::document::ConfigDocument;
use crate::error::StoreError;

/// File extension of configuration documents.
pub const CONFIG_EXTENSION: &str = "json";

/// Resolves configuration names to documents under one directory.
#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    dir: PathBuf,
}

impl ConfigurationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `<name>.json`. Names must be a single plain path component.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let mut parts = Path::new(name).components();
        match (parts.next(), parts.next()) {
            (Some(Component::Normal(stem)), None) if stem == name => {
                Ok(self.dir.join(format!("{name}.{CONFIG_EXTENSION}")))
            }
            _ => Err(StoreError::InvalidName {
                name: name.to_string(),
            }),
        }
    }

    /// Loads and decodes the document named `name`.
    pub fn load(&self, name: &str) -> Result<ConfigDocument, StoreError> {
        let path = self.path_for(name)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        ConfigDocument::from_slice(&bytes).map_err(|source| StoreError::Parse { path, source })
    }
}
