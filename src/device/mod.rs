//! Acquisition device: register protocol, collaborator seams and a simulated converter.
//!
//! - [`protocol`]: register addresses, range codes, channel and sequencer word layouts;
//! - [`DeviceDriver`] / [`DeviceSession`]: the collaborator interface a hardware driver implements;
//! - [`Session`]: scoped ownership (closed on drop);
//! - [`SimulatedDriver`]: in-memory converter used by bench runs and tests.

pub mod protocol;
mod session;
mod sim;

pub use protocol::{Channel, InputRange, Register};
pub use session::{DeviceDriver, DeviceSession, Session, StartRequest};
pub use sim::{DeviceCall, Op, SimulatedDriver};
