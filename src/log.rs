//! Event sink port
//!
//! Every component reports significant events as one plain text line with a
//! bracketed category, e.g. `[capture] page=shop listener=token`. The sink
//! decides where lines go; injecting it keeps event output deterministic in
//! tests.

use std::sync::{Arc, Mutex};

use crate::store::CaptureStore;

/// Receives one line per significant monitor event.
///
/// Implementations must not block; `log` is called from async tasks.
pub trait EventSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards event lines to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "headwatch", "{}", message);
    }
}

/// Collects event lines in memory
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// True if any line contains the given fragment
    pub fn contains(&self, fragment: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .any(|line| line.contains(fragment))
    }
}

impl EventSink for BufferSink {
    fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(message.to_string());
    }
}

/// Forwards event lines to `tracing` and appends them to a capture store's
/// audit log. The append is best-effort: store failures are swallowed, and
/// outside a tokio runtime only the tracing half happens.
pub struct StoreSink {
    store: Arc<dyn CaptureStore>,
    kind: String,
}

impl StoreSink {
    pub fn new(store: Arc<dyn CaptureStore>, kind: impl Into<String>) -> Self {
        Self {
            store,
            kind: kind.into(),
        }
    }
}

impl EventSink for StoreSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "headwatch", "{}", message);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            let kind = self.kind.clone();
            let message = message.to_string();
            handle.spawn(async move {
                let _ = store.append_log(&kind, &message).await;
            });
        }
    }
}

/// Shared sink handle used across runners and the manager
pub type SharedSink = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn buffer_sink_collects_lines() {
        let sink = BufferSink::new();
        sink.log("[refresh] shop");
        sink.log("[capture] page=shop listener=token key=shop-token");

        assert_eq!(sink.lines().len(), 2);
        assert!(sink.contains("[capture]"));
        assert!(!sink.contains("[login]"));
    }

    #[tokio::test]
    async fn store_sink_appends_audit_rows() {
        let store = Arc::new(MemoryStore::new());
        let sink = StoreSink::new(store.clone(), "monitor");

        sink.log("[monitor] stopped all page runners (0)");
        tokio::task::yield_now().await;

        let logs = store.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, "monitor");
        assert!(logs[0].message.contains("stopped all"));
    }

    #[test]
    fn store_sink_outside_runtime_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let sink = StoreSink::new(store, "monitor");
        // No runtime here; the append half is skipped without panicking
        sink.log("[monitor] line");
    }
}
