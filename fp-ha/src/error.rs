//! Error types for trigger execution.

use std::time::Duration;

use thiserror::Error;

/// Reasons a [`Command`](crate::Command) ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("trigger '{trigger}' failed to register: {reason}")]
    Register { trigger: String, reason: String },

    #[error("trigger '{trigger}' was cancelled")]
    Cancelled { trigger: String },

    #[error("trigger '{trigger}' did not finish within {timeout:?}")]
    Timeout { trigger: String, timeout: Duration },

    #[error("trigger '{trigger}' failed: {reason}")]
    Run { trigger: String, reason: String },

    #[error("trigger '{trigger}' verification failed: {reason}")]
    Verify { trigger: String, reason: String },

    #[error("trigger '{trigger}' task aborted: {reason}")]
    Aborted { trigger: String, reason: String },
}

impl CommandError {
    /// Name of the trigger the error belongs to.
    pub fn trigger(&self) -> &str {
        match self {
            Self::Register { trigger, .. }
            | Self::Cancelled { trigger }
            | Self::Timeout { trigger, .. }
            | Self::Run { trigger, .. }
            | Self::Verify { trigger, .. }
            | Self::Aborted { trigger, .. } => trigger,
        }
    }
}

/// Error returned by [`poll_until`](crate::poll_until).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("{what} not reached after {attempts} attempts ({elapsed:?})")]
    Exhausted {
        what: String,
        attempts: usize,
        elapsed: Duration,
    },
}
