//! Reconciliation of operator markers into the authoritative run state.
//!
//! - [`ConfigDocument`]: opaque JSON object handed to the device;
//! - [`ConfigurationStore`]: `<name>` → `<dir>/<name>.json`;
//! - [`DeployMarker`], [`MarkerKind`]: marker file archetypes;
//! - [`Reconciler`]: applies a changed marker to [`SharedRunState`](crate::SharedRunState).

mod document;
mod marker;
mod reconciler;
mod store;

pub use document::ConfigDocument;
pub use marker::{DEPLOY_MARKER, DeployMarker, IMMEDIATE_MARKER, MarkerKind};
pub use reconciler::{Outcome, Reconciler};
pub use store::{CONFIG_EXTENSION, ConfigurationStore};
