//! Integration tests for headwatch
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use std::sync::Arc;

use headwatch::{
    BufferSink, Browser, BrowserConfig, CaptureStore, ListenerConfig, MemoryStore, MonitorConfig,
    MonitorManager, PageConfig,
};

/// Check if Chrome is available
fn chrome_available() -> bool {
    headwatch::browser::find_chrome().is_ok()
}

fn data_page(html: &str) -> String {
    format!("data:text/html,{}", html)
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn browser_launch_and_close() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch(BrowserConfig::default())
        .await
        .expect("Failed to launch browser");
    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn page_navigation_and_url() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch(BrowserConfig::default())
        .await
        .expect("Failed to launch browser");
    let page = browser.open_page().await.expect("Failed to open page");

    page.goto(&data_page("<h1>Hello</h1>"))
        .await
        .expect("Failed to navigate");
    page.wait_for_load(10_000).await.expect("Load timed out");

    let url = page.url().await.expect("Failed to get URL");
    assert!(url.starts_with("data:text/html"));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn page_evaluate_returns_values() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch(BrowserConfig::default())
        .await
        .expect("Failed to launch browser");
    let page = browser.open_page().await.expect("Failed to open page");

    let sum: i64 = page.evaluate("40 + 2").await.expect("Failed to evaluate");
    assert_eq!(sum, 42);

    let text: String = page
        .evaluate("'head' + 'watch'")
        .await
        .expect("Failed to evaluate");
    assert_eq!(text, "headwatch");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn request_capture_sees_fetch_headers() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(BufferSink::new());
    let manager = MonitorManager::new(store.clone(), sink.clone());

    let config = MonitorConfig {
        pages: vec![PageConfig {
            id: "httpbin".to_string(),
            name: "httpbin".to_string(),
            url: "https://httpbin.org/html".to_string(),
            refresh_seconds: 30,
            headless: true,
            listeners: vec![ListenerConfig {
                id: "l1".to_string(),
                name: "accept header".to_string(),
                url_keyword: "httpbin.org".to_string(),
                header_key: "Accept".to_string(),
                primary_key: "httpbin-accept".to_string(),
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    manager
        .run_config(&config)
        .await
        .expect("Failed to start monitoring");

    // The initial document request alone should fire the listener
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let rows = store
        .list_captured_headers()
        .await
        .expect("Failed to list captures");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "httpbin-accept");
    assert_eq!(rows[0].page_id, "httpbin");
    assert!(!rows[0].value.is_empty());
    assert!(sink.contains("[capture] page=httpbin"));

    manager.pause().await;
    assert!(manager.active_pages().await.is_empty());
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn concurrent_pick_reports_already_active() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch(BrowserConfig::default())
        .await
        .expect("Failed to launch browser");
    let page = Arc::new(browser.open_page().await.expect("Failed to open page"));

    page.goto(&data_page("<button id='go'>Go</button>"))
        .await
        .expect("Failed to navigate");
    page.wait_for_load(10_000).await.expect("Load timed out");

    let first = {
        let page = Arc::clone(&page);
        tokio::spawn(async move { headwatch::picker::pick(&page).await })
    };

    // Let the first session install its listeners
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let second = headwatch::picker::pick(&page)
        .await
        .expect("Second pick failed");
    assert_eq!(second, headwatch::PickOutcome::AlreadyActive);

    // A synthetic click resolves the first session
    page.execute("document.getElementById('go').click()")
        .await
        .expect("Failed to click");

    let outcome = first
        .await
        .expect("Pick task panicked")
        .expect("First pick failed");
    match outcome {
        headwatch::PickOutcome::Picked(selector) => {
            assert!(selector.contains("button") || selector.starts_with('#'));
        }
        other => panic!("Expected a picked selector, got {:?}", other),
    }

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn stop_all_releases_engines() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let store: Arc<dyn CaptureStore> = Arc::new(MemoryStore::new());
    let sink = Arc::new(BufferSink::new());
    let manager = MonitorManager::new(store, sink.clone());

    let config = MonitorConfig {
        pages: vec![PageConfig {
            id: "blank".to_string(),
            name: "blank".to_string(),
            url: data_page("<p>idle</p>"),
            refresh_seconds: 30,
            headless: true,
            ..Default::default()
        }],
        ..Default::default()
    };

    manager
        .run_config(&config)
        .await
        .expect("Failed to start monitoring");
    assert_eq!(manager.active_pages().await, vec!["blank"]);

    manager.stop_all().await;
    assert!(manager.active_pages().await.is_empty());
    assert!(sink.contains("[monitor] stopped all page runners (1)"));
}
