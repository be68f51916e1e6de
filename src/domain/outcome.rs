//! Load attempt outcome types.
//!
//! Every dispatched load resolves to one of these. All three are non-fatal:
//! prefetching is best-effort, so a 404 or a timeout is recorded the same
//! way a success is.

use serde::{Deserialize, Serialize};

/// Outcome of a single prefetch load attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOutcome {
    /// Load finished naturally.
    Completed,
    /// Load failed naturally (network error, bad status, decode error).
    Failed(String),
    /// Load exceeded the resource timeout and was abandoned.
    TimedOut,
}

impl LoadOutcome {
    /// True when the resource actually arrived.
    pub fn is_completed(&self) -> bool {
        matches!(self, LoadOutcome::Completed)
    }

    /// True for failures and timeouts alike.
    pub fn is_miss(&self) -> bool {
        !self.is_completed()
    }
}
