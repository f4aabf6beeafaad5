//! Lifecycle status of a download file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Externally visible state. Renaming is not a state of its own: a rename
/// happens entirely inside one serialized operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Initialized,
    InProgress,
    Finished,
    Errored,
}

impl Status {
    /// `Finished` or `Errored`: no further appends are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Errored)
    }

    fn as_u8(self) -> u8 {
        match self {
            Status::Initialized => 0,
            Status::InProgress => 1,
            Status::Finished => 2,
            Status::Errored => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::Initialized,
            1 => Status::InProgress,
            2 => Status::Finished,
            _ => Status::Errored,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Initialized => "initialized",
            Status::InProgress => "in progress",
            Status::Finished => "finished",
            Status::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Status readable from any thread; written only inside serialized operations.
#[derive(Debug)]
pub(super) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(super) fn new(status: Status) -> Self {
        Self(AtomicU8::new(status.as_u8()))
    }

    pub(super) fn load(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(super) fn store(&self, status: Status) {
        self.0.store(status.as_u8(), Ordering::Release);
    }
}
