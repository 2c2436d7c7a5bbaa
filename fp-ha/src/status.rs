use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Command`](crate::Command).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not started yet.
    #[default]
    Unknown,
    /// Waiting for the configured start delay.
    Waiting,
    /// Trigger is running.
    Running,
    /// Trigger ran and the device verified.
    Done,
    /// Registration, run or verification failed, or the command was
    /// cancelled or timed out.
    Failed,
}

impl Status {
    /// Whether no further transitions will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Waiting => "waiting",
            Status::Running => "running",
            Status::Done => "done",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status transition published by a running command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Trigger name.
    pub trigger: String,
    /// New status.
    pub status: Status,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(trigger: impl Into<String>, status: Status) -> Self {
        Self {
            trigger: trigger.into(),
            status,
            at: Utc::now(),
        }
    }
}
