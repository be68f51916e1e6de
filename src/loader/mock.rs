//! Mock loader for tests.
//!
//! Tracks peak in-flight concurrency and every url handed to it, so the
//! scheduler's bounds can be asserted from the outside.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ResourceDescriptor;
use crate::error::{PrefetchError, Result};
use crate::loader::{CancelToken, ResourceLoader};

/// How the mock resolves each load.
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Resolve Ok after the configured delay.
    Succeed,
    /// Resolve Err(reason) after the configured delay.
    Fail(String),
    /// Never resolve; only a timeout ends the attempt.
    Hang,
}

/// Instrumented in-memory `ResourceLoader`.
#[derive(Debug)]
pub struct MockLoader {
    delay: Duration,
    mode: MockMode,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_loads: AtomicUsize,
    loaded: Mutex<Vec<String>>,
}

/// Decrements the in-flight gauge even when the load future is dropped
/// mid-poll (the dispatcher's timeout path).
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockLoader {
    /// Instantly-succeeding loader.
    pub fn new() -> Self {
        Self::with_mode(MockMode::Succeed)
    }

    /// Loader whose every attempt fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_mode(MockMode::Fail(reason.into()))
    }

    /// Loader that never resolves.
    pub fn hanging() -> Self {
        Self::with_mode(MockMode::Hang)
    }

    fn with_mode(mode: MockMode) -> Self {
        Self {
            delay: Duration::ZERO,
            mode,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            total_loads: AtomicUsize::new(0),
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Set how long each load takes before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of simultaneously in-flight loads observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Total loads started (including ones later abandoned).
    pub fn total_loads(&self) -> usize {
        self.total_loads.load(Ordering::SeqCst)
    }

    /// Urls handed to this loader, in dispatch order.
    pub fn loaded_urls(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceLoader for MockLoader {
    async fn load(&self, descriptor: &ResourceDescriptor, _cancel: &CancelToken) -> Result<()> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        self.total_loads.fetch_add(1, Ordering::SeqCst);
        self.loaded.lock().unwrap().push(descriptor.url.clone());

        match &self.mode {
            MockMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            MockMode::Succeed => {
                tokio::time::sleep(self.delay).await;
                Ok(())
            }
            MockMode::Fail(reason) => {
                tokio::time::sleep(self.delay).await;
                Err(PrefetchError::InvalidUrl(reason.clone()))
            }
        }
    }

    fn description(&self) -> &str {
        "mock loader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;

    fn desc(url: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(url, ResourceKind::Script)
    }

    #[tokio::test]
    async fn test_mock_succeeds() {
        let loader = MockLoader::new();
        let token = CancelToken::new();

        assert!(loader.load(&desc("/a.js"), &token).await.is_ok());
        assert_eq!(loader.total_loads(), 1);
        assert_eq!(loader.loaded_urls(), vec!["/a.js".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_fails() {
        let loader = MockLoader::failing("connection reset");
        let token = CancelToken::new();

        let err = loader.load(&desc("/a.js"), &token).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_peak_in_flight_tracks_concurrency() {
        let loader = std::sync::Arc::new(MockLoader::new().with_delay(Duration::from_millis(50)));

        let mut handles = Vec::new();
        for i in 0..3 {
            let loader = loader.clone();
            handles.push(tokio::spawn(async move {
                let token = CancelToken::new();
                let _ = loader.load(&desc(&format!("/{}.js", i)), &token).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(loader.total_loads(), 3);
        assert!(loader.peak_in_flight() >= 2, "loads should overlap");
    }

    #[tokio::test]
    async fn test_in_flight_gauge_released_on_drop() {
        let loader = MockLoader::hanging();
        let token = CancelToken::new();

        {
            let d = desc("/hang.js");
            let fut = loader.load(&d, &token);
            // Poll once so the guard is created, then drop mid-flight
            tokio::select! {
                _ = fut => unreachable!(),
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }

        assert_eq!(loader.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(loader.peak_in_flight(), 1);
    }
}
