//! Headless page runner
//!
//! Drives a background engine with no visible surface. Interception is
//! wired before the first navigation so the initial load's requests are
//! not missed, and navigations settle on a network-idle condition instead
//! of a fixed delay.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{spawn_event_pump, PageRunner, PumpHooks};
use crate::browser::{Browser, BrowserConfig};
use crate::config::PageConfig;
use crate::error::Result;
use crate::log::SharedSink;
use crate::login::LoginAutomator;
use crate::network::NetworkTracker;
use crate::page::Page;
use crate::store::CaptureStore;

/// Wait bound for the network-idle condition after navigate/reload
const IDLE_TIMEOUT_MS: u64 = 30_000;

struct Engine {
    browser: Browser,
    page: Arc<Page>,
}

/// Runner backed by a headless browser engine
pub struct HeadlessRunner {
    config: Arc<PageConfig>,
    store: Arc<dyn CaptureStore>,
    sink: SharedSink,
    automator: Arc<LoginAutomator>,
    tracker: Arc<NetworkTracker>,
    engine: Mutex<Option<Engine>>,
    stop_tx: watch::Sender<bool>,
}

impl HeadlessRunner {
    pub fn new(config: PageConfig, store: Arc<dyn CaptureStore>, sink: SharedSink) -> Self {
        let automator = Arc::new(LoginAutomator::new(
            config.login.clone(),
            config.name.clone(),
            config.url.clone(),
            true,
            Arc::clone(&sink),
        ));
        let (stop_tx, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            store,
            sink,
            automator,
            tracker: Arc::new(NetworkTracker::new()),
            engine: Mutex::new(None),
            stop_tx,
        }
    }

    /// Refresh loop: reload, wait for the network to settle, then try a
    /// login. Ticks are serialized: a cycle that outlives the interval
    /// delays the next tick. A failing cycle is logged and the next tick
    /// still fires.
    fn spawn_refresh(&self, page: Arc<Page>) {
        let config = Arc::clone(&self.config);
        let sink = Arc::clone(&self.sink);
        let tracker = Arc::clone(&self.tracker);
        let automator = Arc::clone(&self.automator);
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let period = config.refresh_interval();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                        sink.log(&format!("[refresh:headless] {}", config.name));

                        let cycle: Result<()> = async {
                            // Navigating cancels leftover requests whose
                            // terminal events may never arrive
                            tracker.reset().await;
                            page.reload(false).await?;
                            tracker.wait_for_idle(IDLE_TIMEOUT_MS).await?;
                            Ok(())
                        }
                        .await;

                        match cycle {
                            Ok(()) => automator.attempt(&page).await,
                            Err(e) => sink.log(&format!(
                                "[refresh:headless] failed page={}: {}",
                                config.name, e
                            )),
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl PageRunner for HeadlessRunner {
    fn page_id(&self) -> &str {
        &self.config.id
    }

    async fn start(&self) -> Result<()> {
        let browser = Browser::launch(BrowserConfig::default()).await?;
        let page = Arc::new(browser.open_page().await?);

        let transport = Arc::clone(browser.connection().transport());

        {
            let mut engine = self.engine.lock().await;
            if *self.stop_tx.borrow() {
                // Stopped before startup got this far
                let _ = browser.close().await;
                return Ok(());
            }
            *engine = Some(Engine {
                browser,
                page: Arc::clone(&page),
            });
        }

        // Wire interception before navigating so the first load's requests
        // are captured
        page.enable_request_capture().await?;
        spawn_event_pump(
            transport,
            Arc::clone(&self.config),
            Arc::clone(&self.tracker),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            PumpHooks {
                login_on_load: None,
            },
            self.stop_tx.subscribe(),
        );

        self.sink.log(&format!(
            "[runner] opening headless page {} - {}",
            self.config.name, self.config.url
        ));

        page.goto(&self.config.url).await?;
        self.tracker.wait_for_idle(IDLE_TIMEOUT_MS).await?;

        self.spawn_refresh(Arc::clone(&page));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let _ = self.stop_tx.send(true);

        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            // Closes the whole engine, not just the page
            if let Err(e) = engine.browser.close().await {
                self.sink.log(&format!(
                    "[runner] close failed page={}: {}",
                    self.config.name, e
                ));
            }
        }
        Ok(())
    }

    async fn page(&self) -> Option<Arc<Page>> {
        let engine = self.engine.lock().await;
        engine.as_ref().map(|e| Arc::clone(&e.page))
    }
}
