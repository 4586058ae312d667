//! Network Request Observation
//!
//! Decodes CDP network events into request snapshots for header matching
//! and tracks in-flight requests to provide a network-idle wait condition.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::cdp::transport::CdpMessage;
use crate::cdp::types::{
    NetworkLoadingFailedEvent, NetworkLoadingFinishedEvent, NetworkRequestWillBeSentEvent,
};
use crate::error::{Error, Result};

/// A request header value as seen on the wire.
///
/// CDP folds repeated headers into one newline-separated string; those are
/// split back into `Many` so captures can re-join them with `,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    /// The value recorded on a capture: multi-valued headers join with `,`
    pub fn capture_value(&self) -> String {
        match self {
            HeaderValue::One(v) => v.clone(),
            HeaderValue::Many(vs) => vs.join(","),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(raw: &str) -> Self {
        if raw.contains('\n') {
            HeaderValue::Many(raw.split('\n').map(str::to_string).collect())
        } else {
            HeaderValue::One(raw.to_string())
        }
    }
}

/// An outgoing HTTP request observed on a monitored page
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    /// CDP request ID
    pub request_id: String,
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, HeaderValue>,
    /// Monotonic CDP timestamp
    pub timestamp: f64,
}

impl RequestSnapshot {
    fn from_event(event: NetworkRequestWillBeSentEvent) -> Self {
        let headers = event
            .request
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), HeaderValue::from(value.as_str())))
            .collect();

        Self {
            request_id: event.request_id,
            url: event.request.url,
            method: event.request.method,
            headers,
            timestamp: event.timestamp,
        }
    }
}

/// Tracks in-flight requests from the CDP event stream.
///
/// One tracker per page session. `observe` feeds it every transport event;
/// `wait_for_idle` implements the headless backend's navigation settle
/// condition: at most [`IDLE_MAX_INFLIGHT`] requests in flight continuously
/// for [`IDLE_QUIET_MS`].
pub struct NetworkTracker {
    inflight: Mutex<HashSet<String>>,
}

/// In-flight requests tolerated while considering the network idle
const IDLE_MAX_INFLIGHT: usize = 2;
/// Quiet period the in-flight count must hold below the threshold
const IDLE_QUIET_MS: u64 = 500;
/// Poll interval for the idle check
const IDLE_POLL_MS: u64 = 50;

impl NetworkTracker {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashSet::new()),
        }
    }

    /// Process a transport event. Returns a snapshot when the event was a
    /// new outgoing request; other network events only update accounting.
    pub async fn observe(&self, msg: &CdpMessage) -> Option<RequestSnapshot> {
        let CdpMessage::Event { method, params, .. } = msg else {
            return None;
        };

        match method.as_str() {
            "Network.requestWillBeSent" => {
                let event: NetworkRequestWillBeSentEvent =
                    serde_json::from_value(params.clone()).ok()?;
                {
                    let mut inflight = self.inflight.lock().await;
                    inflight.insert(event.request_id.clone());
                }
                Some(RequestSnapshot::from_event(event))
            }
            "Network.loadingFinished" => {
                if let Ok(event) =
                    serde_json::from_value::<NetworkLoadingFinishedEvent>(params.clone())
                {
                    let mut inflight = self.inflight.lock().await;
                    inflight.remove(&event.request_id);
                }
                None
            }
            "Network.loadingFailed" => {
                if let Ok(event) =
                    serde_json::from_value::<NetworkLoadingFailedEvent>(params.clone())
                {
                    let mut inflight = self.inflight.lock().await;
                    inflight.remove(&event.request_id);
                }
                None
            }
            _ => None,
        }
    }

    /// Number of requests currently in flight
    pub async fn inflight_count(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Forget all in-flight requests (used when a reload starts over)
    pub async fn reset(&self) {
        self.inflight.lock().await.clear();
    }

    /// Wait until the network has been idle for the quiet period
    pub async fn wait_for_idle(&self, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);
        let quiet_polls = (IDLE_QUIET_MS / IDLE_POLL_MS).max(1);
        let mut consecutive = 0u64;

        loop {
            if self.inflight_count().await <= IDLE_MAX_INFLIGHT {
                consecutive += 1;
                if consecutive >= quiet_polls {
                    return Ok(());
                }
            } else {
                consecutive = 0;
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Network did not go idle within {}ms",
                    timeout_ms
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(IDLE_POLL_MS)).await;
        }
    }
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self::new()
    }
}
