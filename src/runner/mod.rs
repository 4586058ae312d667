//! Page runners
//!
//! One runner supervises one monitored page: it owns the page's browser
//! engine, its request-interception pipeline and its scheduled refreshes.
//! Two variants share the same contract: [`InteractiveRunner`] drives a
//! visible browser window, [`HeadlessRunner`] a background engine.

pub mod headless;
pub mod interactive;

pub use headless::HeadlessRunner;
pub use interactive::InteractiveRunner;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cdp::Transport;
use crate::config::PageConfig;
use crate::error::Result;
use crate::log::SharedSink;
use crate::login::LoginAutomator;
use crate::matcher::match_request;
use crate::network::{NetworkTracker, RequestSnapshot};
use crate::page::Page;
use crate::store::CaptureStore;

/// The live supervisory unit for one monitored page.
///
/// Lifecycle: Created -> Starting -> Running -> Stopping -> Stopped.
/// Runners are single-use: the orchestrator builds a fresh runner per
/// `run_config` and never restarts a stopped one. `stop` is idempotent and
/// safe to call in any state, including after a failed `start`.
#[async_trait]
pub trait PageRunner: Send + Sync {
    /// Id of the page this runner supervises
    fn page_id(&self) -> &str;

    /// Open the browser engine, wire interception and begin refreshing
    async fn start(&self) -> Result<()>;

    /// Cancel the refresh timer and release the browser engine
    async fn stop(&self) -> Result<()>;

    /// Live page handle, while the runner is running
    async fn page(&self) -> Option<Arc<Page>>;
}

/// Evaluate one intercepted request and forward every fired match.
///
/// A store failure for one match is logged and does not block the
/// remaining listeners. Identical requests produce identical captures on
/// both backends because both route through here.
pub(crate) async fn process_request(
    config: &PageConfig,
    snapshot: &RequestSnapshot,
    store: &Arc<dyn CaptureStore>,
    sink: &SharedSink,
) {
    for hit in match_request(snapshot, &config.listeners) {
        match store
            .upsert_captured_header(&hit.primary_key, &hit.value, &config.id, &hit.listener_name)
            .await
        {
            Ok(()) => sink.log(&format!(
                "[capture] page={} listener={} key={}",
                config.name, hit.listener_name, hit.primary_key
            )),
            Err(e) => sink.log(&format!(
                "[capture] store failed page={} key={}: {}",
                config.name, hit.primary_key, e
            )),
        }
    }
}

/// What the event pump does besides feeding the matcher
pub(crate) struct PumpHooks {
    /// Re-attempt login on every finished page load (interactive backend)
    pub login_on_load: Option<(Arc<LoginAutomator>, Arc<Page>)>,
}

/// Drain the engine's CDP event stream until the runner stops or the
/// engine goes away. Every intercepted request is matched and forwarded;
/// failures stay inside this task and are logged, never propagated to the
/// engine.
pub(crate) fn spawn_event_pump(
    transport: Arc<Transport>,
    config: Arc<PageConfig>,
    tracker: Arc<NetworkTracker>,
    store: Arc<dyn CaptureStore>,
    sink: SharedSink,
    hooks: PumpHooks,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = stop_rx.changed() => break,
                msg = transport.recv_event() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Some(snapshot) = tracker.observe(&msg).await {
                process_request(&config, &snapshot, &store, &sink).await;
                continue;
            }

            if let crate::cdp::CdpMessage::Event { method, .. } = &msg {
                if method.as_str() == "Page.loadEventFired" {
                    if let Some((automator, page)) = &hooks.login_on_load {
                        let automator = Arc::clone(automator);
                        let page = Arc::clone(page);
                        tokio::spawn(async move {
                            automator.attempt(&page).await;
                        });
                    }
                }
            }
        }

        tracing::debug!("Event pump for page '{}' ended", config.id);
    })
}
