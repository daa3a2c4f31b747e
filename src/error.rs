//! Error types used by the rakevisor runtime and its collaborators.
//!
//! - [`RuntimeError`]: faults that make supervision impossible (raised before the loop starts).
//! - [`DeviceError`]: failures reported by the acquisition device; they end the current run.
//! - [`ReconcileError`] / [`StoreError`]: marker and configuration faults; always absorbed into "no run".
//! - [`PinError`]: hardware input faults; always absorbed into "not low".
//!
//! Every enum provides `as_label` for logs and events.

use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the supervisor runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The watched configuration directory is missing or not a directory.
    #[error("watched directory {path:?} is not usable: {source}")]
    WatchDirectory {
        /// Directory that was configured.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use rakevisor::RuntimeError;
    ///
    /// let err = RuntimeError::WatchDirectory {
    ///     path: "/trake/configuration".into(),
    ///     source: std::io::Error::from(std::io::ErrorKind::NotFound),
    /// };
    /// assert_eq!(err.as_label(), "runtime_watch_directory");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::WatchDirectory { .. } => "runtime_watch_directory",
        }
    }
}

/// # Errors reported by the acquisition device collaborator.
///
/// None of these are retried: a failing call ends the current run and the
/// supervisor returns to idle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The session could not be opened.
    #[error("cannot open device on bus {bus} device {device}: {reason}")]
    Open {
        /// SPI bus number.
        bus: u8,
        /// Chip-select index on the bus.
        device: u8,
        /// Driver-provided detail.
        reason: String,
    },

    /// A register transfer failed.
    #[error("register 0x{address:02x} transfer failed: {reason}")]
    Register {
        /// Register address.
        address: u8,
        /// Driver-provided detail.
        reason: String,
    },

    /// Sequence arrays differ in length.
    #[error("sequence sides differ in length: a={a} b={b}")]
    SequenceMismatch {
        /// Number of A-side entries.
        a: usize,
        /// Number of B-side entries.
        b: usize,
    },

    /// Sequence is empty or longer than the sequencer stack.
    #[error("sequence length {len} outside 1..={max}")]
    SequenceLength {
        /// Requested length.
        len: usize,
        /// Sequencer capacity.
        max: usize,
    },

    /// A channel code outside the permitted set.
    #[error("channel code {code} is not a physical or diagnostic channel")]
    InvalidChannel {
        /// Rejected code.
        code: u8,
    },

    /// Periodic acquisition could not be started.
    #[error("acquisition start failed: {reason}")]
    Start {
        /// Driver-provided detail.
        reason: String,
    },

    /// Periodic acquisition could not be stopped.
    #[error("acquisition stop failed: {reason}")]
    Stop {
        /// Driver-provided detail.
        reason: String,
    },

    /// The power-low query failed.
    #[error("power-low query failed: {reason}")]
    PowerQuery {
        /// Driver-provided detail.
        reason: String,
    },
}

impl DeviceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeviceError::Open { .. } => "device_open",
            DeviceError::Register { .. } => "device_register",
            DeviceError::SequenceMismatch { .. } => "device_sequence_mismatch",
            DeviceError::SequenceLength { .. } => "device_sequence_length",
            DeviceError::InvalidChannel { .. } => "device_invalid_channel",
            DeviceError::Start { .. } => "device_start",
            DeviceError::Stop { .. } => "device_stop",
            DeviceError::PowerQuery { .. } => "device_power_query",
        }
    }
}

/// # Errors resolving a configuration name to a document.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Name is empty or would escape the configuration directory.
    #[error("configuration name {name:?} is not a plain file stem")]
    InvalidName {
        /// Rejected name.
        name: String,
    },

    /// No `<name>.json` exists.
    #[error("configuration file {path:?} does not exist")]
    NotFound {
        /// Resolved path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read configuration file {path:?}: {source}")]
    Io {
        /// Resolved path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON object.
    #[error("configuration file {path:?} is not a JSON object: {source}")]
    Parse {
        /// Resolved path.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::InvalidName { .. } => "store_invalid_name",
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Io { .. } => "store_io",
            StoreError::Parse { .. } => "store_parse",
        }
    }
}

/// # Reasons a deploy marker yields "no run".
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The marker could not be read.
    #[error("cannot read deploy marker {path:?}: {source}")]
    MarkerIo {
        /// Marker path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The marker is not `{"configurationName": "<name>"}`.
    #[error("deploy marker {path:?} is malformed: {source}")]
    MarkerParse {
        /// Marker path.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },

    /// The named configuration did not resolve.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::MarkerIo { .. } => "marker_io",
            ReconcileError::MarkerParse { .. } => "marker_parse",
            ReconcileError::Store(e) => e.as_label(),
        }
    }
}

/// # Errors reading the hardware power-low input.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PinError {
    /// The pin resource could not be acquired or read.
    #[error("cannot read input pin {path:?}: {source}")]
    Io {
        /// Value file of the pin.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The pin reported something other than `0` or `1`.
    #[error("input pin {path:?} reported unexpected level {raw:?}")]
    InvalidLevel {
        /// Value file of the pin.
        path: PathBuf,
        /// Raw content read.
        raw: String,
    },
}

impl PinError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PinError::Io { .. } => "pin_io",
            PinError::InvalidLevel { .. } => "pin_invalid_level",
        }
    }
}
