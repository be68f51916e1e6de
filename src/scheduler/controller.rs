//! Rate/concurrency controller and the public scheduler facade.
//!
//! The tick loop here is the only code that mutates the active set and the
//! dispatch window, and the only caller of the type dispatcher. Everything
//! else (enqueue, completions, the trigger adapter) funnels into `tick`,
//! which dispatches as much queued work as the slots, the sliding window
//! and the minimum inter-dispatch gap allow.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::admission;
use crate::config::{HttpConfig, SchedulerConfig};
use crate::domain::{Priority, ResourceDescriptor, ResourceKind};
use crate::error::Result;
use crate::history::{AttemptRecord, HistoryStore};
use crate::loader::{self, HttpLoader, ResourceLoader};
use crate::queue::PrefetchQueue;
use crate::scheduler::window::RateWindow;
use crate::trigger::NearVisibleEvent;

/// Counter snapshot exposed by `PrefetchScheduler::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub queue_length: usize,
    pub active_count: usize,
    pub history_count: usize,
}

/// Mutable scheduler state. Guarded by a Mutex that is never held across
/// an await, so every mutation is one atomic step between suspension
/// points.
struct SchedulerState {
    queue: PrefetchQueue,
    active: HashSet<String>,
    window: RateWindow,
    history: HistoryStore,
    enabled: bool,
    last_dispatch: Option<Instant>,
    tick_scheduled: bool,
    trigger_task: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    base: Url,
    loader: Arc<dyn ResourceLoader>,
    state: Mutex<SchedulerState>,
}

/// Opportunistic prefetch scheduler.
///
/// Construct one per page/session with an explicit config, base origin and
/// loader. Cloning shares the same scheduler. Must live inside a Tokio
/// runtime: dispatching spawns tasks.
///
/// The mutating surface never returns an error and never panics on bad
/// input; candidates that cannot be prefetched are silently filtered.
#[derive(Clone)]
pub struct PrefetchScheduler {
    inner: Arc<SchedulerInner>,
}

impl PrefetchScheduler {
    /// Create a scheduler with an injected loader.
    pub fn new(config: SchedulerConfig, base: Url, loader: Arc<dyn ResourceLoader>) -> Result<Self> {
        config.validate()?;
        let enabled = config.enabled;

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                config,
                base,
                loader,
                state: Mutex::new(SchedulerState {
                    queue: PrefetchQueue::new(),
                    active: HashSet::new(),
                    window: RateWindow::per_second(),
                    history: HistoryStore::new(),
                    enabled,
                    last_dispatch: None,
                    tick_scheduled: false,
                    trigger_task: None,
                }),
            }),
        })
    }

    /// Create a scheduler backed by the production HTTP loader.
    pub fn with_http_loader(config: SchedulerConfig, base: Url, http: &HttpConfig) -> Result<Self> {
        let loader = Arc::new(HttpLoader::new(http)?);
        Self::new(config, base, loader)
    }

    /// Nominate a url for prefetching.
    pub fn prefetch(&self, url: &str, kind: ResourceKind, priority: Option<Priority>) {
        let descriptor =
            ResourceDescriptor::new(url, kind).with_priority(priority.unwrap_or_default());
        self.prefetch_descriptor(descriptor);
    }

    /// Nominate a document link.
    pub fn prefetch_link(&self, url: &str, priority: Option<Priority>) {
        self.prefetch(url, ResourceKind::Document, priority);
    }

    /// Nominate an image.
    pub fn prefetch_image(&self, url: &str, priority: Option<Priority>) {
        self.prefetch(url, ResourceKind::Image, priority);
    }

    /// Nominate a fully-specified descriptor (the trigger adapter path).
    pub fn prefetch_descriptor(&self, descriptor: ResourceDescriptor) {
        submit(&self.inner, descriptor);
    }

    /// Resume scheduling. History survives disable/enable; the queue does
    /// not. A trigger source torn down by disable() must be re-attached
    /// by the owner.
    pub fn enable(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.enabled = true;
        }
        tracing::info!("Prefetch scheduler enabled");
        tick(&self.inner);
    }

    /// Stop scheduling: drop queued work, reset the rate bookkeeping and
    /// detach the trigger source. Loads already in flight are not aborted;
    /// their completions still land in history.
    pub fn disable(&self) {
        let trigger_task = {
            let mut state = self.inner.state.lock().unwrap();
            state.enabled = false;
            state.queue.clear();
            state.active.clear();
            state.window.reset();
            state.last_dispatch = None;
            state.trigger_task.take()
        };
        if let Some(task) = trigger_task {
            task.abort();
        }
        tracing::info!("Prefetch scheduler disabled");
    }

    /// Forget every attempted url, re-opening them for admission.
    pub fn clear_history(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.history.clear();
    }

    /// Current counters.
    pub fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock().unwrap();
        SchedulerStatus {
            enabled: state.enabled,
            queue_length: state.queue.len(),
            active_count: state.active.len(),
            history_count: state.history.len(),
        }
    }

    /// Diagnostic dump of attempted urls with outcomes, oldest first.
    pub fn attempts(&self) -> Vec<(String, AttemptRecord)> {
        let state = self.inner.state.lock().unwrap();
        state.history.snapshot()
    }

    /// Resolve once the queue and the in-flight set are both empty.
    ///
    /// Polling convenience for CLIs and tests; it adds no ordering
    /// guarantee of its own.
    pub async fn drained(&self) {
        loop {
            {
                let state = self.inner.state.lock().unwrap();
                if state.queue.is_empty() && state.active.is_empty() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Hook up a near-visible event source. Replaces (and aborts the
    /// forwarding of) any previously attached source.
    pub fn attach_trigger(&self, mut events: mpsc::Receiver<NearVisibleEvent>) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::trace!(url = %event.url, "Near-visible event");
                submit(&inner, event.into_descriptor());
            }
        });

        let previous = {
            let mut state = self.inner.state.lock().unwrap();
            state.trigger_task.replace(handle)
        };
        if let Some(task) = previous {
            task.abort();
        }
    }

    /// How far ahead of the viewport the trigger source should fire.
    pub fn trigger_distance_px(&self) -> u32 {
        self.inner.config.trigger_distance_px
    }

    /// The document origin urls resolve against.
    pub fn base(&self) -> &Url {
        &self.inner.base
    }
}

/// Admission + enqueue. Ticks only when something was actually queued.
fn submit(inner: &Arc<SchedulerInner>, descriptor: ResourceDescriptor) {
    let queued = {
        let mut state = inner.state.lock().unwrap();
        match admission::admit(
            &inner.base,
            &descriptor.url,
            state.enabled,
            &state.history,
            &state.active,
        ) {
            Ok(resolved) => {
                let mut descriptor = descriptor;
                descriptor.url = String::from(resolved);
                let url = descriptor.url.clone();
                if state.queue.push(descriptor) {
                    true
                } else {
                    tracing::debug!(url = %url, "Prefetch candidate already queued");
                    false
                }
            }
            Err(reason) => {
                tracing::debug!(url = %descriptor.url, reason = %reason, "Prefetch candidate rejected");
                false
            }
        }
    };

    if queued {
        tick(inner);
    }
}

/// Dispatch as much queued work as current admission allows.
///
/// When the window or the minimum gap is the blocking condition and work
/// remains queued, exactly one delayed re-tick is scheduled for the moment
/// the constraint lifts.
fn tick(inner: &Arc<SchedulerInner>) {
    let mut to_dispatch = Vec::new();
    let mut retry_in: Option<Duration> = None;

    {
        let mut state = inner.state.lock().unwrap();
        if !state.enabled {
            return;
        }

        while !state.queue.is_empty() {
            if state.active.len() >= inner.config.max_concurrent_requests {
                // A completion will tick again; no timer needed
                break;
            }

            let now = Instant::now();
            if let Some(wait) = state
                .window
                .time_until_slot(now, inner.config.max_requests_per_second)
            {
                retry_in = Some(wait.max(inner.config.min_delay()));
                break;
            }
            if let Some(last) = state.last_dispatch {
                let since = now.duration_since(last);
                if since < inner.config.min_delay() {
                    retry_in = Some(inner.config.min_delay() - since);
                    break;
                }
            }

            let Some(descriptor) = state.queue.pop() else {
                break;
            };
            state.window.record(now);
            state.last_dispatch = Some(now);
            state.active.insert(descriptor.url.clone());
            to_dispatch.push(descriptor);
        }

        if let Some(delay) = retry_in
            && !state.queue.is_empty()
            && !state.tick_scheduled
        {
            state.tick_scheduled = true;
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                inner.state.lock().unwrap().tick_scheduled = false;
                tick(&inner);
            });
        }
    }

    for descriptor in to_dispatch {
        spawn_load(inner, descriptor);
    }
}

/// Hand one descriptor to the type dispatcher on its own task. On any
/// outcome the slot is freed, history is updated and the controller ticks
/// again.
fn spawn_load(inner: &Arc<SchedulerInner>, descriptor: ResourceDescriptor) {
    tracing::debug!(url = %descriptor.url, kind = %descriptor.kind, "Dispatching prefetch");
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let outcome = loader::dispatch(
            inner.loader.as_ref(),
            &descriptor,
            inner.config.resource_timeout(),
        )
        .await;
        tracing::debug!(url = %descriptor.url, outcome = ?outcome, "Prefetch attempt finished");

        {
            let mut state = inner.state.lock().unwrap();
            state.active.remove(&descriptor.url);
            state.history.record(&descriptor.url, outcome);
        }
        tick(&inner);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LoadOutcome;
    use crate::loader::MockLoader;

    fn base() -> Url {
        Url::parse("https://app.example/").unwrap()
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_requests: 4,
            max_requests_per_second: 100,
            min_delay_between_requests_ms: 0,
            resource_timeout_ms: 1000,
            ..Default::default()
        }
    }

    fn scheduler_with(config: SchedulerConfig, loader: Arc<MockLoader>) -> PrefetchScheduler {
        PrefetchScheduler::new(config, base(), loader).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SchedulerConfig {
            max_concurrent_requests: 0,
            ..Default::default()
        };
        let loader = Arc::new(MockLoader::new());
        assert!(PrefetchScheduler::new(config, base(), loader).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_dispatches_and_records() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.prefetch_image("/a.png", None);
        scheduler.drained().await;

        let status = scheduler.status();
        assert_eq!(status.queue_length, 0);
        assert_eq!(status.active_count, 0);
        assert_eq!(status.history_count, 1);
        assert_eq!(loader.loaded_urls(), vec!["https://app.example/a.png".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_idempotence() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        for _ in 0..5 {
            scheduler.prefetch_image("/a.png", None);
        }
        scheduler.drained().await;

        assert_eq!(loader.total_loads(), 1);
        assert_eq!(scheduler.status().history_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_candidates_leave_no_trace() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.prefetch_link("#top", None);
        scheduler.prefetch_link("mailto:a@b.com", None);
        scheduler.prefetch_link("tel:123", None);
        scheduler.prefetch_image("https://other-domain.example/x.png", None);

        let status = scheduler.status();
        assert_eq!(status.queue_length, 0);
        assert_eq!(status.active_count, 0);
        assert_eq!(status.history_count, 0);
        assert_eq!(loader.total_loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_respected() {
        let loader = Arc::new(MockLoader::new().with_delay(Duration::from_millis(100)));
        let config = SchedulerConfig {
            max_concurrent_requests: 3,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        for i in 0..5 {
            scheduler.prefetch_image(&format!("/img-{}.png", i), None);
        }
        scheduler.drained().await;

        assert_eq!(loader.total_loads(), 5);
        assert!(
            loader.peak_in_flight() <= 3,
            "peak {} exceeded slot limit",
            loader.peak_in_flight()
        );
        assert_eq!(scheduler.status().history_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bound_spreads_dispatches() {
        let loader = Arc::new(MockLoader::new());
        let config = SchedulerConfig {
            max_concurrent_requests: 10,
            max_requests_per_second: 2,
            min_delay_between_requests_ms: 0,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        let started = Instant::now();
        for i in 0..6 {
            scheduler.prefetch_image(&format!("/img-{}.png", i), None);
        }
        scheduler.drained().await;

        assert_eq!(loader.total_loads(), 6);
        // 6 dispatches at 2/s need at least two extra full windows
        assert!(
            started.elapsed() >= Duration::from_secs(2),
            "elapsed {:?} too fast for the rate bound",
            started.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_gap_spaces_dispatches() {
        let loader = Arc::new(MockLoader::new());
        let config = SchedulerConfig {
            min_delay_between_requests_ms: 200,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        let started = Instant::now();
        for i in 0..3 {
            scheduler.prefetch_image(&format!("/img-{}.png", i), None);
        }
        scheduler.drained().await;

        assert_eq!(loader.total_loads(), 3);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_order_of_dispatch() {
        let loader = Arc::new(MockLoader::new());
        let config = SchedulerConfig {
            max_concurrent_requests: 1,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        // One slot: the first nomination occupies it, the rest queue up
        scheduler.prefetch_image("/first.png", None);
        scheduler.prefetch_image("/low.png", Some(Priority::Low));
        scheduler.prefetch_image("/high.png", Some(Priority::High));
        scheduler.drained().await;

        let urls = loader.loaded_urls();
        let high_at = urls.iter().position(|u| u.ends_with("/high.png")).unwrap();
        let low_at = urls.iter().position(|u| u.ends_with("/low.png")).unwrap();
        assert!(high_at < low_at, "high priority dispatched after low: {:?}", urls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reclaims_slot() {
        let loader = Arc::new(MockLoader::hanging());
        let config = SchedulerConfig {
            max_concurrent_requests: 1,
            resource_timeout_ms: 500,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        scheduler.prefetch_image("/hangs.png", None);
        scheduler.prefetch_image("/after.png", None);
        scheduler.drained().await;

        // Both attempted through the single slot: each timeout freed it
        // for the next queued descriptor
        assert_eq!(loader.total_loads(), 2);
        let attempts = scheduler.attempts();
        assert_eq!(attempts.len(), 2);
        assert!(
            attempts
                .iter()
                .all(|(_, record)| record.outcome == LoadOutcome::TimedOut)
        );
        assert_eq!(scheduler.status().active_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_recorded_like_success() {
        let loader = Arc::new(MockLoader::failing("404"));
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.prefetch_link("/missing", None);
        scheduler.drained().await;

        let attempts = scheduler.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(matches!(attempts[0].1.outcome, LoadOutcome::Failed(_)));

        // Attempted means deduped, even though it failed
        scheduler.prefetch_link("/missing", None);
        scheduler.drained().await;
        assert_eq!(loader.total_loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_drops_queue_keeps_in_flight() {
        let loader = Arc::new(MockLoader::new().with_delay(Duration::from_millis(200)));
        let config = SchedulerConfig {
            max_concurrent_requests: 1,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        scheduler.prefetch_image("/active.png", None);
        scheduler.prefetch_image("/queued-1.png", None);
        scheduler.prefetch_image("/queued-2.png", None);

        // Let the first dispatch start
        tokio::task::yield_now().await;
        scheduler.disable();

        let status = scheduler.status();
        assert!(!status.enabled);
        assert_eq!(status.queue_length, 0);

        // The in-flight load still completes into history
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scheduler.status().history_count, 1);
        assert_eq!(loader.total_loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_rejects_everything() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.disable();
        scheduler.prefetch_image("/a.png", None);

        assert_eq!(scheduler.status().queue_length, 0);
        assert_eq!(loader.total_loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_survives_disable_enable() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.prefetch_image("/a.png", None);
        scheduler.drained().await;
        assert_eq!(scheduler.status().history_count, 1);

        scheduler.disable();
        scheduler.enable();
        assert_eq!(scheduler.status().history_count, 1);

        // Still deduped after the cycle
        scheduler.prefetch_image("/a.png", None);
        scheduler.drained().await;
        assert_eq!(loader.total_loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_history_reopens_admission() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        scheduler.prefetch_image("/a.png", None);
        scheduler.drained().await;
        scheduler.clear_history();
        assert_eq!(scheduler.status().history_count, 0);

        scheduler.prefetch_image("/a.png", None);
        scheduler.drained().await;
        assert_eq!(loader.total_loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_events_flow_into_scheduler() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        let (tx, rx) = mpsc::channel(16);
        scheduler.attach_trigger(rx);

        tx.send(NearVisibleEvent::new("/hero.png", ResourceKind::Image))
            .await
            .unwrap();
        tx.send(NearVisibleEvent::new("#top", ResourceKind::Document))
            .await
            .unwrap();

        // Let the forwarding task run, then wait out the load
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.drained().await;

        assert_eq!(loader.loaded_urls(), vec!["https://app.example/hero.png".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_detaches_trigger() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader.clone());

        let (tx, rx) = mpsc::channel(16);
        scheduler.attach_trigger(rx);
        scheduler.disable();
        scheduler.enable();

        // Forwarding task is gone; events go nowhere
        let _ = tx.send(NearVisibleEvent::new("/a.png", ResourceKind::Image)).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(loader.total_loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot_mid_flight() {
        let loader = Arc::new(MockLoader::new().with_delay(Duration::from_millis(100)));
        let config = SchedulerConfig {
            max_concurrent_requests: 2,
            ..fast_config()
        };
        let scheduler = scheduler_with(config, loader.clone());

        for i in 0..4 {
            scheduler.prefetch_image(&format!("/img-{}.png", i), None);
        }
        tokio::task::yield_now().await;

        let status = scheduler.status();
        assert!(status.enabled);
        assert_eq!(status.active_count, 2);
        assert_eq!(status.queue_length, 2);

        scheduler.drained().await;
        assert_eq!(scheduler.status().history_count, 4);
    }

    #[test]
    fn test_status_serialization() {
        let status = SchedulerStatus {
            enabled: true,
            queue_length: 2,
            active_count: 1,
            history_count: 7,
        };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: SchedulerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_distance_surfaced() {
        let loader = Arc::new(MockLoader::new());
        let scheduler = scheduler_with(fast_config(), loader);
        assert_eq!(scheduler.trigger_distance_px(), 200);
        assert_eq!(scheduler.base().as_str(), "https://app.example/");
    }
}
