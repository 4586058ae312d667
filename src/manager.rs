//! Monitor orchestration
//!
//! Owns the registry of active page runners, applies whole configurations
//! (stop-all-then-start-each), and routes operator requests to the runner
//! that owns the page.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::config::{MonitorConfig, PageConfig};
use crate::error::{Error, Result};
use crate::log::SharedSink;
use crate::picker::{self, PickOutcome};
use crate::runner::{HeadlessRunner, InteractiveRunner, PageRunner};
use crate::store::CaptureStore;

/// Builds the runner variant for one page configuration
pub trait RunnerFactory: Send + Sync {
    fn build(
        &self,
        config: PageConfig,
        store: Arc<dyn CaptureStore>,
        sink: SharedSink,
    ) -> Arc<dyn PageRunner>;
}

/// Picks the execution backend from the page's `headless` flag
struct DefaultRunnerFactory;

impl RunnerFactory for DefaultRunnerFactory {
    fn build(
        &self,
        config: PageConfig,
        store: Arc<dyn CaptureStore>,
        sink: SharedSink,
    ) -> Arc<dyn PageRunner> {
        if config.headless {
            Arc::new(HeadlessRunner::new(config, store, sink))
        } else {
            Arc::new(InteractiveRunner::new(config, store, sink))
        }
    }
}

/// The monitoring orchestrator
pub struct MonitorManager {
    store: Arc<dyn CaptureStore>,
    sink: SharedSink,
    factory: Box<dyn RunnerFactory>,
    runners: Mutex<HashMap<String, Arc<dyn PageRunner>>>,
}

impl MonitorManager {
    pub fn new(store: Arc<dyn CaptureStore>, sink: SharedSink) -> Self {
        Self::with_factory(store, sink, Box::new(DefaultRunnerFactory))
    }

    /// Construct with a custom runner factory (used by tests to avoid
    /// launching real browsers)
    pub fn with_factory(
        store: Arc<dyn CaptureStore>,
        sink: SharedSink,
        factory: Box<dyn RunnerFactory>,
    ) -> Self {
        Self {
            store,
            sink,
            factory,
            runners: Mutex::new(HashMap::new()),
        }
    }

    /// Apply a full configuration: stop everything, then start one runner
    /// per page. Startups are sequential; the first failing `start`
    /// propagates (its runner stays registered for the next teardown).
    pub async fn run_config(&self, config: &MonitorConfig) -> Result<()> {
        config.validate()?;

        self.stop_all().await;

        for page_config in &config.pages {
            let runner = self.factory.build(
                page_config.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.sink),
            );

            // Register before starting so a concurrent stop request can
            // still find and tear down this runner
            {
                let mut runners = self.runners.lock().await;
                runners.insert(runner.page_id().to_string(), Arc::clone(&runner));
            }

            if let Err(e) = runner.start().await {
                self.sink.log(&format!(
                    "[runner] start failed page={}: {}",
                    page_config.name, e
                ));
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stop every registered runner, waiting for all outcomes, then clear
    /// the registry. Individual stop failures are logged and tolerated.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Arc<dyn PageRunner>)> = {
            let mut runners = self.runners.lock().await;
            runners.drain().collect()
        };

        let count = drained.len();
        let stops = drained
            .into_iter()
            .map(|(id, runner)| async move { (id, runner.stop().await) });

        for (id, outcome) in join_all(stops).await {
            if let Err(e) = outcome {
                self.sink
                    .log(&format!("[monitor] stop failed page={}: {}", id, e));
            }
        }

        self.sink
            .log(&format!("[monitor] stopped all page runners ({})", count));
    }

    /// Look up the runner supervising a page id
    pub async fn get_runner(&self, page_id: &str) -> Option<Arc<dyn PageRunner>> {
        let runners = self.runners.lock().await;
        runners.get(page_id).cloned()
    }

    /// Ids of the currently registered runners
    pub async fn active_pages(&self) -> Vec<String> {
        let runners = self.runners.lock().await;
        runners.keys().cloned().collect()
    }

    /// Run an interactive selector-picking session on a monitored page.
    /// Fails when the page has no live runner or its surface is gone.
    pub async fn pick_selector(&self, page_id: &str) -> Result<PickOutcome> {
        let runner = self
            .get_runner(page_id)
            .await
            .ok_or_else(|| Error::PageNotRunning(page_id.to_string()))?;

        let page = runner
            .page()
            .await
            .ok_or_else(|| Error::PageNotRunning(page_id.to_string()))?;

        self.sink
            .log(&format!("[picker] start page={}", page_id));
        let outcome = picker::pick(&page).await?;

        match &outcome {
            PickOutcome::Picked(selector) => self
                .sink
                .log(&format!("[picker] done selector={}", selector)),
            PickOutcome::AlreadyActive => self
                .sink
                .log(&format!("[picker] already active page={}", page_id)),
        }

        Ok(outcome)
    }

    /// Pause monitoring entirely
    pub async fn pause(&self) {
        self.stop_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::BufferSink;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubStats {
        started: AtomicUsize,
        stopped: AtomicUsize,
    }

    struct StubRunner {
        id: String,
        stats: Arc<StubStats>,
        fail_start: bool,
        fail_stop: bool,
    }

    #[async_trait]
    impl PageRunner for StubRunner {
        fn page_id(&self) -> &str {
            &self.id
        }

        async fn start(&self) -> Result<()> {
            if self.fail_start {
                return Err(Error::Launch("no browser here".to_string()));
            }
            self.stats.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stats.stopped.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(Error::transport("engine already gone"));
            }
            Ok(())
        }

        async fn page(&self) -> Option<Arc<crate::page::Page>> {
            None
        }
    }

    struct StubFactory {
        stats: Arc<StubStats>,
        fail_start_for: Option<String>,
        fail_stop: bool,
    }

    impl RunnerFactory for StubFactory {
        fn build(
            &self,
            config: PageConfig,
            _store: Arc<dyn CaptureStore>,
            _sink: SharedSink,
        ) -> Arc<dyn PageRunner> {
            Arc::new(StubRunner {
                fail_start: self.fail_start_for.as_deref() == Some(config.id.as_str()),
                fail_stop: self.fail_stop,
                id: config.id,
                stats: Arc::clone(&self.stats),
            })
        }
    }

    fn page(id: &str, headless: bool) -> PageConfig {
        PageConfig {
            id: id.to_string(),
            name: id.to_string(),
            url: "https://example.com".to_string(),
            headless,
            ..Default::default()
        }
    }

    fn manager(stats: &Arc<StubStats>, fail_start_for: Option<&str>, fail_stop: bool) -> MonitorManager {
        MonitorManager::with_factory(
            Arc::new(MemoryStore::new()),
            Arc::new(BufferSink::new()),
            Box::new(StubFactory {
                stats: Arc::clone(stats),
                fail_start_for: fail_start_for.map(str::to_string),
                fail_stop,
            }),
        )
    }

    #[tokio::test]
    async fn run_config_starts_one_runner_per_page() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![page("a", false), page("b", true)],
            ..Default::default()
        };

        manager.run_config(&config).await.unwrap();

        let mut active = manager.active_pages().await;
        active.sort();
        assert_eq!(active, vec!["a", "b"]);
        assert_eq!(stats.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_config_is_idempotent() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![page("a", false)],
            ..Default::default()
        };

        manager.run_config(&config).await.unwrap();
        manager.run_config(&config).await.unwrap();

        // Exactly one live runner per page id, never two
        assert_eq!(manager.active_pages().await, vec!["a"]);
        assert_eq!(stats.started.load(Ordering::SeqCst), 2);
        assert_eq!(stats.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_config_rejects_invalid_config() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![PageConfig::default()],
            ..Default::default()
        };

        assert!(matches!(
            manager.run_config(&config).await,
            Err(Error::Config(_))
        ));
        assert_eq!(stats.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_start_propagates_and_stays_registered() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, Some("b"), false);

        let config = MonitorConfig {
            pages: vec![page("a", false), page("b", false), page("c", false)],
            ..Default::default()
        };

        assert!(manager.run_config(&config).await.is_err());

        // Startups are sequential: c never started
        assert_eq!(stats.started.load(Ordering::SeqCst), 1);
        let mut active = manager.active_pages().await;
        active.sort();
        assert_eq!(active, vec!["a", "b"]);

        // The next teardown reaps the failed runner too
        manager.stop_all().await;
        assert!(manager.active_pages().await.is_empty());
    }

    #[tokio::test]
    async fn stop_all_empties_registry_even_when_stops_fail() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, true);

        let config = MonitorConfig {
            pages: vec![page("a", false), page("b", true)],
            ..Default::default()
        };
        manager.run_config(&config).await.unwrap();

        manager.stop_all().await;
        assert!(manager.active_pages().await.is_empty());
        assert_eq!(stats.stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pause_stops_everything() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![page("a", false)],
            ..Default::default()
        };
        manager.run_config(&config).await.unwrap();

        manager.pause().await;
        assert!(manager.active_pages().await.is_empty());
    }

    #[tokio::test]
    async fn pick_selector_on_unknown_page_fails() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let result = manager.pick_selector("nope").await;
        assert!(matches!(result, Err(Error::PageNotRunning(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn pick_selector_on_stopped_page_fails() {
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![page("a", false)],
            ..Default::default()
        };
        manager.run_config(&config).await.unwrap();
        manager.stop_all().await;

        assert!(matches!(
            manager.pick_selector("a").await,
            Err(Error::PageNotRunning(_))
        ));
    }

    #[tokio::test]
    async fn pick_selector_without_live_surface_fails() {
        // Stub runners report no live page even when "running"
        let stats = Arc::new(StubStats::default());
        let manager = manager(&stats, None, false);

        let config = MonitorConfig {
            pages: vec![page("a", false)],
            ..Default::default()
        };
        manager.run_config(&config).await.unwrap();

        assert!(matches!(
            manager.pick_selector("a").await,
            Err(Error::PageNotRunning(_))
        ));
    }
}
