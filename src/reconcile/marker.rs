//! # Marker files dropped by operators into the watched directory.
//!
//! - `__runfile__.deploy`: `{"configurationName": "<name>"}`; presence expresses run intent.
//! - `__immediate__.execute`: presence requests a one-shot action; deleted afterwards.
//!
//! Markers are recognised by file name anywhere under the watched directory.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name of the deploy marker.
pub const DEPLOY_MARKER: &str = "__runfile__.deploy";
/// File name of the immediate-execute marker.
pub const IMMEDIATE_MARKER: &str = "__immediate__.execute";

/// Classification of a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Deploy,
    Immediate,
    Other,
}

impl MarkerKind {
    pub fn of(path: &Path) -> Self {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(DEPLOY_MARKER) => MarkerKind::Deploy,
            Some(IMMEDIATE_MARKER) => MarkerKind::Immediate,
            _ => MarkerKind::Other,
        }
    }
}

/// Body of the deploy marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployMarker {
    #[serde(rename = "configurationName")]
    pub configuration_name: String,
}

impl DeployMarker {
    pub fn new(configuration_name: impl Into<String>) -> Self {
        Self {
            configuration_name: configuration_name.into(),
        }
    }

    /// Parses a marker body. Only a JSON object is accepted; the derived
    /// deserializer alone would also take the sequence form `["name"]`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let object: Map<String, Value> = serde_json::from_slice(bytes)?;
        serde_json::from_value(Value::Object(object))
    }
}
