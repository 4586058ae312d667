//! # Headwatch
//!
//! Concurrent web page monitor that captures rotating request headers.
//!
//! Headwatch supervises a configurable set of pages, one browser engine per
//! page, over a custom CDP (Chrome DevTools Protocol) implementation. Every
//! outgoing request a page makes is matched against that page's listener
//! rules; matched header values are persisted under their logical keys for
//! downstream consumers. Pages run on one of two interchangeable backends:
//! a visible browser window the operator can use, or a headless engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use headwatch::{CaptureStore, MemoryStore, MonitorConfig, MonitorManager, TracingSink};
//!
//! #[tokio::main]
//! async fn main() -> headwatch::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let manager = MonitorManager::new(store.clone(), Arc::new(TracingSink));
//!
//!     // One runner per configured page; captures flow into the store
//!     let config: MonitorConfig = serde_json::from_str(
//!         r#"{
//!             "pages": [{
//!                 "id": "shop",
//!                 "name": "Shop backend",
//!                 "url": "https://shop.example.com/admin",
//!                 "refreshSeconds": 15,
//!                 "headless": true,
//!                 "listeners": [{
//!                     "id": "l1",
//!                     "name": "inventory token",
//!                     "urlKeyword": "/api/inventory",
//!                     "headerKey": "X-Token",
//!                     "primaryKey": "shop-token"
//!                 }]
//!             }]
//!         }"#,
//!     )?;
//!     manager.run_config(&config).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!
//!     for row in store.list_captured_headers().await? {
//!         println!("{} = {}", row.key, row.value);
//!     }
//!
//!     manager.pause().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Operator surface
//!
//! The host drives three operations: [`MonitorManager::run_config`],
//! [`MonitorManager::pause`] and [`MonitorManager::pick_selector`] (an
//! interactive session that resolves with the CSS selector of the element
//! the operator clicks). Event lines go to the injected [`EventSink`].

pub mod browser;
pub mod cdp;
pub mod config;
pub mod error;
pub mod log;
pub mod login;
pub mod manager;
pub mod matcher;
pub mod network;
pub mod page;
pub mod picker;
pub mod runner;
pub mod store;

// Re-exports
pub use browser::{Browser, BrowserConfig};
pub use config::{ConfigStore, ListenerConfig, LoginConfig, MonitorConfig, PageConfig};
pub use error::{Error, Result};
pub use log::{BufferSink, EventSink, SharedSink, StoreSink, TracingSink};
pub use login::LoginAutomator;
pub use manager::{MonitorManager, RunnerFactory};
pub use matcher::{match_request, ListenerHit};
pub use network::{HeaderValue, NetworkTracker, RequestSnapshot};
pub use page::Page;
pub use picker::PickOutcome;
pub use runner::{HeadlessRunner, InteractiveRunner, PageRunner};
pub use store::{CaptureStore, CapturedHeader, LogEntry, MemoryStore};
