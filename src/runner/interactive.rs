//! Interactive page runner
//!
//! Drives a visible browser window the operator can see and use. The
//! interception hook is registered only once the initial load succeeds;
//! login re-attempts ride on the page's load events.

use std::sync::atomic::{AtomicBool, Ordering};
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

/// Wait bound for the initial page load
const INITIAL_LOAD_TIMEOUT_MS: u64 = 30_000;

struct Engine {
    browser: Browser,
    page: Arc<Page>,
}

/// Runner backed by a visible browser window
pub struct InteractiveRunner {
    config: Arc<PageConfig>,
    store: Arc<dyn CaptureStore>,
    sink: SharedSink,
    automator: Arc<LoginAutomator>,
    engine: Mutex<Option<Engine>>,
    stop_tx: watch::Sender<bool>,
    hooked: AtomicBool,
}

impl InteractiveRunner {
    pub fn new(config: PageConfig, store: Arc<dyn CaptureStore>, sink: SharedSink) -> Self {
        let automator = Arc::new(LoginAutomator::new(
            config.login.clone(),
            config.name.clone(),
            config.url.clone(),
            false,
            Arc::clone(&sink),
        ));
        let (stop_tx, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            store,
            sink,
            automator,
            engine: Mutex::new(None),
            stop_tx,
            hooked: AtomicBool::new(false),
        }
    }

    /// Register the request-interception hook. A no-op when the hook is
    /// already attached to this engine.
    async fn register_interception(&self, page: &Arc<Page>, browser: &Browser) -> Result<()> {
        if self.hooked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        page.enable_request_capture().await?;

        spawn_event_pump(
            Arc::clone(browser.connection().transport()),
            Arc::clone(&self.config),
            Arc::new(NetworkTracker::new()),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            PumpHooks {
                login_on_load: Some((Arc::clone(&self.automator), Arc::clone(page))),
            },
            self.stop_tx.subscribe(),
        );

        self.sink.log(&format!(
            "[runner] interception registered page={}",
            self.config.name
        ));
        Ok(())
    }

    /// Refresh loop. Ticks are serialized: a reload that outlives the
    /// interval delays the next tick, so reloads never overlap.
    fn spawn_refresh(&self, page: Arc<Page>) {
        let config = Arc::clone(&self.config);
        let sink = Arc::clone(&self.sink);
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
                        sink.log(&format!("[refresh] {}", config.name));
                        if let Err(e) = page.reload(true).await {
                            sink.log(&format!(
                                "[refresh] failed page={}: {}",
                                config.name, e
                            ));
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl PageRunner for InteractiveRunner {
    fn page_id(&self) -> &str {
        &self.config.id
    }

    async fn start(&self) -> Result<()> {
        let browser = Browser::launch(BrowserConfig::interactive()).await?;
        let page = Arc::new(browser.open_page().await?);

        // Keep the engine reachable before navigating so a concurrent stop
        // can still tear it down.
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

        self.sink.log(&format!(
            "[runner] opening page {} - {}",
            self.config.name, self.config.url
        ));

        page.goto(&self.config.url).await?;
        page.wait_for_load(INITIAL_LOAD_TIMEOUT_MS).await?;

        {
            let engine = self.engine.lock().await;
            let Some(engine) = engine.as_ref() else {
                // Stopped while the initial load was in flight
                return Ok(());
            };
            self.register_interception(&page, &engine.browser).await?;
        }

        self.spawn_refresh(Arc::clone(&page));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let _ = self.stop_tx.send(true);

        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            // The window may already be gone if the operator closed it
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
