//! High-availability triggers for featureprofiles tests.
//!
//! A [`Trigger`] is a disruptive action against a device under test: a
//! process restart, a line card reload, a supervisor switchover. A
//! [`Command`] runs a trigger exactly once, optionally after a delay and
//! optionally under a timeout, and reports its progress as a sequence of
//! [`Status`] transitions:
//!
//! ```text
//! Unknown -> [Waiting ->] Running -> Done | Failed
//! ```
//!
//! [`poll_until`] covers the recovery side: probing the device at a fixed
//! interval until it reports the expected state.

mod command;
mod error;
mod poll;
mod status;
mod trigger;

pub use command::{Command, CommandHandle, run_all};
pub use error::{CommandError, PollError};
pub use poll::poll_until;
pub use status::{Status, StatusUpdate};
pub use trigger::Trigger;
