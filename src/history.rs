//! History store - record of every url ever dispatched.
//!
//! History is the dedup backbone: once a url has been handed to the type
//! dispatcher it stays here (with its outcome) until an explicit
//! clear_history(). Growth is monotonic by design; disable()/enable()
//! cycles do not touch it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::LoadOutcome;

/// What happened to one dispatched url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub outcome: LoadOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Record of attempted urls, keyed by resolved absolute url.
#[derive(Debug, Default)]
pub struct HistoryStore {
    attempts: HashMap<String, AttemptRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the url has ever been dispatched.
    pub fn contains(&self, url: &str) -> bool {
        self.attempts.contains_key(url)
    }

    /// Record the outcome of a finished attempt.
    ///
    /// A repeat record for the same url overwrites the previous outcome;
    /// admission dedup makes that unreachable in normal operation.
    pub fn record(&mut self, url: &str, outcome: LoadOutcome) {
        self.attempts.insert(
            url.to_string(),
            AttemptRecord {
                outcome,
                completed_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Drop all recorded attempts.
    pub fn clear(&mut self) {
        self.attempts.clear();
    }

    /// Snapshot of all attempts, oldest first.
    pub fn snapshot(&self) -> Vec<(String, AttemptRecord)> {
        let mut entries: Vec<_> = self
            .attempts
            .iter()
            .map(|(url, record)| (url.clone(), record.clone()))
            .collect();
        entries.sort_by_key(|(_, record)| record.completed_at);
        entries
    }

    /// Look up the outcome recorded for a url.
    pub fn get(&self, url: &str) -> Option<&AttemptRecord> {
        self.attempts.get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_history_is_empty() {
        let history = HistoryStore::new();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
        assert!(!history.contains("https://app.example/a.png"));
    }

    #[test]
    fn test_record_and_contains() {
        let mut history = HistoryStore::new();
        history.record("https://app.example/a.png", LoadOutcome::Completed);

        assert!(history.contains("https://app.example/a.png"));
        assert_eq!(history.len(), 1);
        assert!(
            history
                .get("https://app.example/a.png")
                .unwrap()
                .outcome
                .is_completed()
        );
    }

    #[test]
    fn test_failed_attempt_recorded_like_success() {
        let mut history = HistoryStore::new();
        history.record("https://app.example/missing.css", LoadOutcome::Failed("404".into()));

        // Attempted, not succeeded, is the dedup contract
        assert!(history.contains("https://app.example/missing.css"));
    }

    #[test]
    fn test_clear() {
        let mut history = HistoryStore::new();
        history.record("https://app.example/a", LoadOutcome::Completed);
        history.record("https://app.example/b", LoadOutcome::TimedOut);
        assert_eq!(history.len(), 2);

        history.clear();
        assert!(history.is_empty());
        assert!(!history.contains("https://app.example/a"));
    }

    #[test]
    fn test_snapshot_sorted_by_completion() {
        let mut history = HistoryStore::new();
        history.record("https://app.example/first", LoadOutcome::Completed);
        std::thread::sleep(std::time::Duration::from_millis(2));
        history.record("https://app.example/second", LoadOutcome::TimedOut);

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, "https://app.example/first");
        assert_eq!(snapshot[1].0, "https://app.example/second");
    }

    #[test]
    fn test_attempt_record_serialization() {
        let record = AttemptRecord {
            outcome: LoadOutcome::Failed("connection reset".into()),
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: AttemptRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
    }
}
