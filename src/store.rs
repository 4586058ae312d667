//! Capture persistence port
//!
//! The monitor core only ever talks to this trait; the host supplies the
//! real storage engine. `MemoryStore` is the reference implementation used
//! by tests and by hosts that do not need durable storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;

/// The latest captured value for one logical key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedHeader {
    /// Logical storage key (a listener's primaryKey)
    pub key: String,
    /// Captured header value
    pub value: String,
    /// Page the capture came from
    pub page_id: String,
    /// Listener that fired
    pub listener_name: String,
    /// Stamped by the store, monotonically advancing
    pub updated_at: DateTime<Utc>,
}

/// An appended audit log row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator consumed by the monitor core.
///
/// `upsert_captured_header` keeps at most one row per key (last writer
/// wins). `append_log` is best-effort: callers swallow its failures.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Record the latest value for a key, overwriting any existing row
    async fn upsert_captured_header(
        &self,
        key: &str,
        value: &str,
        page_id: &str,
        listener_name: &str,
    ) -> Result<()>;

    /// All captured rows, most recently updated first
    async fn list_captured_headers(&self) -> Result<Vec<CapturedHeader>>;

    /// Append an audit log row
    async fn append_log(&self, kind: &str, message: &str) -> Result<()>;
}

#[derive(Default)]
struct MemoryStoreInner {
    rows: HashMap<String, CapturedHeader>,
    logs: Vec<LogEntry>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryStoreInner {
    /// Timestamps come from the store so concurrent writers to the same
    /// key always order consistently, even within one clock tick.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let mut stamp = Utc::now();
        if let Some(last) = self.last_stamp {
            if stamp <= last {
                stamp = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// In-memory [`CaptureStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appended log rows, in insertion order
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().await.logs.clone()
    }
}

#[async_trait]
impl CaptureStore for MemoryStore {
    async fn upsert_captured_header(
        &self,
        key: &str,
        value: &str,
        page_id: &str,
        listener_name: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let updated_at = inner.next_stamp();
        inner.rows.insert(
            key.to_string(),
            CapturedHeader {
                key: key.to_string(),
                value: value.to_string(),
                page_id: page_id.to_string(),
                listener_name: listener_name.to_string(),
                updated_at,
            },
        );
        Ok(())
    }

    async fn list_captured_headers(&self) -> Result<Vec<CapturedHeader>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<CapturedHeader> = inner.rows.values().cloned().collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn append_log(&self, kind: &str, message: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let created_at = inner.next_stamp();
        inner.logs.push(LogEntry {
            kind: kind.to_string(),
            message: message.to_string(),
            created_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_keeps_one_row_per_key() {
        let store = MemoryStore::new();
        store
            .upsert_captured_header("shop-token", "old", "p1", "token")
            .await
            .unwrap();
        store
            .upsert_captured_header("shop-token", "new", "p2", "token2")
            .await
            .unwrap();

        let rows = store.list_captured_headers().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "new");
        assert_eq!(rows[0].page_id, "p2");
        assert_eq!(rows[0].listener_name, "token2");
    }

    #[tokio::test]
    async fn list_orders_most_recent_first() {
        let store = MemoryStore::new();
        store
            .upsert_captured_header("a", "1", "p", "l")
            .await
            .unwrap();
        store
            .upsert_captured_header("b", "2", "p", "l")
            .await
            .unwrap();
        store
            .upsert_captured_header("c", "3", "p", "l")
            .await
            .unwrap();

        let rows = store.list_captured_headers().await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn stamps_advance_monotonically() {
        let store = MemoryStore::new();
        for i in 0..50 {
            store
                .upsert_captured_header(&format!("k{}", i), "v", "p", "l")
                .await
                .unwrap();
        }

        let mut rows = store.list_captured_headers().await.unwrap();
        rows.reverse();
        for pair in rows.windows(2) {
            assert!(pair[0].updated_at < pair[1].updated_at);
        }
    }

    #[tokio::test]
    async fn append_log_records_rows() {
        let store = MemoryStore::new();
        store.append_log("monitor", "[capture] hit").await.unwrap();
        let logs = store.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, "monitor");
    }
}
