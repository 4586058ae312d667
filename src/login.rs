//! Unattended login automation
//!
//! Drives a credential-submission sequence inside a page context whenever
//! the page (re)loads and the page's login config allows it. The sequence
//! itself runs as one injected script so filled fields emit the `input` and
//! `change` events the host page's own scripts listen for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::LoginConfig;
use crate::error::Result;
use crate::log::SharedSink;
use crate::page::Page;

/// Wait after submitting before navigating back to the monitored URL
const SETTLE_AFTER_SUBMIT: Duration = Duration::from_secs(10);

/// True when the login sequence may run at all for this backend
pub fn is_eligible(login: &LoginConfig, headless_backend: bool) -> bool {
    if !login.enabled || !login.auto {
        return false;
    }
    if headless_backend && !login.headless {
        return false;
    }
    true
}

/// True when the page still needs a login attempt. Being anywhere under the
/// configured URL counts as already logged in.
pub fn login_needed(current_url: &str, target_url: &str) -> bool {
    !current_url.starts_with(target_url)
}

/// Build the injected credential-submission script. The login config is
/// embedded as JSON; empty selectors make their step a no-op in the page.
pub fn build_login_script(login: &LoginConfig) -> Result<String> {
    let cfg = serde_json::to_string(login)?;
    Ok(format!(
        r#"(() => {{
  const cfg = {cfg};
  const click = (selector) => {{
    if (!selector) return;
    const el = document.querySelector(selector);
    if (el) el.click();
  }};
  const input = (selector, val) => {{
    if (!selector) return;
    const el = document.querySelector(selector);
    if (el) {{
      el.focus();
      el.value = val || '';
      el.dispatchEvent(new Event('input', {{ bubbles: true }}));
      el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    }}
  }};
  if (cfg.loginTypeSelector) click(cfg.loginTypeSelector);
  input(cfg.usernameSelector, cfg.username);
  input(cfg.passwordSelector, cfg.password);
  click(cfg.submitSelector);
}})();"#
    ))
}

/// Per-runner login driver
pub struct LoginAutomator {
    login: LoginConfig,
    page_name: String,
    target_url: String,
    headless_backend: bool,
    sink: SharedSink,
    in_flight: AtomicBool,
}

impl LoginAutomator {
    pub fn new(
        login: LoginConfig,
        page_name: impl Into<String>,
        target_url: impl Into<String>,
        headless_backend: bool,
        sink: SharedSink,
    ) -> Self {
        Self {
            login,
            page_name: page_name.into(),
            target_url: target_url.into(),
            headless_backend,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one login attempt if eligible. Overlapping attempts (rapid
    /// reloads) are dropped, not queued. Failures are logged and never
    /// propagate to the runner.
    pub async fn attempt(&self, page: &Page) {
        if !is_eligible(&self.login, self.headless_backend) {
            return;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.run(page).await {
            self.sink
                .log(&format!("[login] failed page={}: {}", self.page_name, e));
        }

        self.in_flight.store(false, Ordering::SeqCst);
    }

    async fn run(&self, page: &Page) -> Result<()> {
        let current = page.url().await?;
        if !login_needed(&current, &self.target_url) {
            return Ok(());
        }

        self.sink
            .log(&format!("[login] starting page={}", self.page_name));

        page.execute(&build_login_script(&self.login)?).await?;

        // Assume the submit completed a redirect-based flow, then force the
        // page back to the monitored URL.
        tokio::time::sleep(SETTLE_AFTER_SUBMIT).await;
        page.goto(&self.target_url).await?;
        Ok(())
    }
}
