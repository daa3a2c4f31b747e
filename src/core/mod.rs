//! Runtime core: configuration, shared state and the control loop.
//!
//! Internal modules:
//! - [`config`]: runtime settings and defaults;
//! - [`state`]: the single-mutex [`SharedRunState`];
//! - [`supervisor`]: control loop and teardown;
//! - [`builder`]: wiring of collaborators into a [`Supervisor`];
//! - [`shutdown`]: OS signal handling.

mod builder;
pub mod config;
pub mod shutdown;
pub mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use state::{RunIntent, RunState, SharedRunState};
pub use supervisor::{Supervisor, Termination};
