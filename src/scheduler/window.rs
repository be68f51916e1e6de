//! Sliding-window dispatch rate accounting.
//!
//! Tracks the instants of recent dispatches over a rolling one-second span
//! and answers whether another dispatch fits under the per-second cap.
//! Entries older than the span are pruned on every check, so the deque
//! never grows past the cap.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Rolling window over dispatch timestamps.
#[derive(Debug)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
    span: Duration,
}

impl RateWindow {
    /// Standard one-second window.
    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn new(span: Duration) -> Self {
        Self {
            timestamps: VecDeque::new(),
            span,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.span {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Dispatches still inside the window.
    pub fn occupancy(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    /// Would one more dispatch stay under the cap?
    pub fn would_admit(&mut self, now: Instant, cap: usize) -> bool {
        self.occupancy(now) < cap
    }

    /// Record a dispatch at `now`.
    pub fn record(&mut self, now: Instant) {
        self.prune(now);
        self.timestamps.push_back(now);
    }

    /// How long until the window frees a slot, if it is currently full.
    ///
    /// Returns None when a slot is already free.
    pub fn time_until_slot(&mut self, now: Instant, cap: usize) -> Option<Duration> {
        if self.would_admit(now, cap) {
            return None;
        }
        // Window is full, so there are at least `cap` >= 1 entries; the
        // oldest one leaving opens the next slot.
        let oldest = *self.timestamps.front()?;
        Some(self.span.saturating_sub(now.duration_since(oldest)))
    }

    /// Forget all recorded dispatches (disable path).
    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}
