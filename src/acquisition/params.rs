//! # Run parameters resolved from a configuration document.
//!
//! | key              | type                                   | default                      |
//! |------------------|----------------------------------------|------------------------------|
//! | `averagecount`   | unsigned                               | 10                           |
//! | `sampleperiodms` | unsigned                               | 1                            |
//! | `datafolder`     | string                                 | `Config::data_folder`        |
//! | `channelmap`     | `{"Achannels": [..], "Bchannels": [..]}` | board trace routing map      |
//! | `inputrange`     | `"+-10V"`, `"+-5V"`, `"+-2.5V"`        | ±2.5 V                       |
//!
//! Absent or mistyped keys fall back to the default; unusable `inputrange` and
//! `channelmap` values are logged. Channel codes and list lengths are not
//! checked here; the device rejects what it cannot sequence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::InputRange;
use crate::reconcile::ConfigDocument;

pub const DEFAULT_AVERAGE_COUNT: u32 = 10;
pub const DEFAULT_SAMPLE_PERIOD_MS: u32 = 1;

/// Data file names are the UTC start time, second resolution.
pub const DATA_FILE_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// A-side / B-side channel pairs of one periodic scan pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    #[serde(rename = "Achannels")]
    pub a: Vec<u8>,
    #[serde(rename = "Bchannels")]
    pub b: Vec<u8>,
}

impl Default for ChannelMap {
    /// Mapping for the rake boards: A-side groups 0-3 and 4-7 are reversed
    /// relative to B-side, and boards 3 and 4 are swapped.
    fn default() -> Self {
        Self {
            a: vec![3, 2, 1, 0, 6, 7, 5, 4],
            b: vec![4, 5, 6, 7, 0, 1, 2, 3],
        }
    }
}

/// Everything the orchestrator needs to configure and start the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionParams {
    pub input_range: InputRange,
    pub channels: ChannelMap,
    pub average_count: u32,
    pub sample_period_ms: u32,
    pub data_folder: PathBuf,
}

impl AcquisitionParams {
    pub fn resolve(doc: &ConfigDocument, default_folder: &Path) -> Self {
        let input_range = match doc.get("inputrange").and_then(|v| v.as_str()) {
            None => InputRange::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                debug!(value = raw, error = %e, "unrecognised inputrange; using default");
                InputRange::default()
            }),
        };
        let channels = match doc.get("channelmap") {
            None => ChannelMap::default(),
            Some(raw) => ChannelMap::deserialize(raw).unwrap_or_else(|e| {
                debug!(value = %raw, error = %e, "unusable channelmap; using board default");
                ChannelMap::default()
            }),
        };
        let default_folder = default_folder.to_string_lossy();

        Self {
            input_range,
            channels,
            average_count: doc.u32_or("averagecount", DEFAULT_AVERAGE_COUNT),
            sample_period_ms: doc.u32_or("sampleperiodms", DEFAULT_SAMPLE_PERIOD_MS),
            data_folder: PathBuf::from(doc.str_or("datafolder", &default_folder)),
        }
    }
}

/// `YYYY-MM-DD_HH.MM.SS` for `at`.
pub fn data_file_name(at: DateTime<Utc>) -> String {
    at.format(DATA_FILE_FORMAT).to_string()
}
