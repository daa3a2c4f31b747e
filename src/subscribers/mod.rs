//! # Event subscribers.
//!
//! ```text
//! Bus ──► supervisor listener ──► SubscriberSet::emit
//!                                    ├──► [queue] ──► LogWriter (tracing)
//!                                    └──► [queue] ──► user subscriber ...
//! ```
//!
//! - [`Subscribe`]: trait implemented by event consumers;
//! - [`SubscriberSet`]: per-subscriber queues with panic isolation;
//! - [`LogWriter`]: renders events through `tracing`.

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
