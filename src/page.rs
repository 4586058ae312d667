//! Page Abstraction
//!
//! High-level API for driving one monitored browser page.

use crate::cdp::Session;
use crate::error::{Error, Result};

/// A browser page attached over CDP
pub struct Page {
    session: Session,
}

impl Page {
    /// Create a new Page wrapping a CDP session
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        let result = self.session.navigate(url).await?;
        if let Some(error) = result.error_text {
            return Err(Error::Navigation(error));
        }
        Ok(())
    }

    /// Reload the page, optionally bypassing the cache
    pub async fn reload(&self, ignore_cache: bool) -> Result<()> {
        self.session.reload(ignore_cache).await
    }

    /// Get the current URL
    pub async fn url(&self) -> Result<String> {
        let frame_tree = self.session.get_frame_tree().await?;
        Ok(frame_tree.frame.url)
    }

    /// Enable network request events for this page
    pub async fn enable_request_capture(&self) -> Result<()> {
        self.session.network_enable().await
    }

    /// Evaluate JavaScript and return the deserialized result
    pub async fn evaluate<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = self.session.evaluate(expression).await?;

        if let Some(exception) = result.exception_details {
            return Err(Error::Script(format!(
                "{} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        if let Some(value) = result.result.value {
            let typed: T = serde_json::from_value(value)?;
            return Ok(typed);
        }

        Err(Error::Script("No value returned from evaluate".into()))
    }

    /// Execute JavaScript without expecting a return value
    pub async fn execute(&self, expression: &str) -> Result<()> {
        let result = self.session.evaluate(expression).await?;

        if let Some(exception) = result.exception_details {
            return Err(Error::Script(format!(
                "{} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        Ok(())
    }

    /// Evaluate JavaScript that returns a promise, awaiting its settled
    /// value. Suspends indefinitely until the page resolves it.
    pub async fn evaluate_promise<T: serde::de::DeserializeOwned>(
        &self,
        expression: &str,
    ) -> Result<T> {
        let result = self.session.evaluate_promise(expression).await?;

        if let Some(exception) = result.exception_details {
            return Err(Error::Script(format!(
                "{} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        if let Some(value) = result.result.value {
            let typed: T = serde_json::from_value(value)?;
            return Ok(typed);
        }

        Err(Error::Script("Promise resolved without a value".into()))
    }

    /// Wait for the document to finish loading by polling readyState
    pub async fn wait_for_load(&self, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);
        let poll_interval = std::time::Duration::from_millis(50);

        loop {
            match self.session.evaluate("document.readyState").await {
                Ok(result) => {
                    if let Some(value) = result.result.value {
                        if value.as_str() == Some("complete") {
                            return Ok(());
                        }
                    }
                }
                Err(_) => {
                    // readyState is unavailable mid-navigation; keep polling
                }
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Page did not finish loading within {}ms",
                    timeout_ms
                )));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
