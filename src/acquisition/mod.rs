//! Acquisition runs: parameter resolution and the device orchestration sequence.

mod orchestrator;
mod params;

pub use orchestrator::{AcquisitionOrchestrator, RunReport, WaitExit};
pub use params::{
    AcquisitionParams, ChannelMap, DATA_FILE_FORMAT, DEFAULT_AVERAGE_COUNT,
    DEFAULT_SAMPLE_PERIOD_MS, data_file_name,
};
