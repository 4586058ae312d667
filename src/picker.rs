//! Interactive selector picking
//!
//! Injects a page-scoped picking session and resolves with the CSS selector
//! of the element the operator clicks. The browser-side logic is a script
//! payload; this module only sends it and awaits the one resolved value.

use serde::Deserialize;

use crate::error::Result;
use crate::page::Page;

/// Marker the in-page session returns when a pick is already running
const ALREADY_ACTIVE: &str = "already-active";

/// The in-page picking session.
///
/// Guarded by a page-global flag so a second concurrent pick resolves
/// immediately instead of stacking overlays. Hovering highlights the target
/// and shows the composed selector; clicking suppresses the default action,
/// copies the selector to the clipboard (best-effort), tears everything
/// down and resolves. The promise has no timeout.
///
/// Selector composition walks up to 5 ancestor levels: `tag#id` ends the
/// walk, otherwise `tag.class1.class2` (first two class tokens), joined
/// with ` > `.
const PICKER_SCRIPT: &str = r#"
(() => {
  if (window.__headwatchPickActive) {
    return Promise.resolve({ selector: '', reason: 'already-active' });
  }
  window.__headwatchPickActive = true;
  const getSelector = (el) => {
    if (!el) return '';
    if (el.id) return '#' + el.id;
    const parts = [];
    while (el && el.nodeType === 1 && parts.length < 5) {
      let name = el.nodeName.toLowerCase();
      if (el.className && typeof el.className === 'string') {
        const cls = el.className.trim().split(/\s+/).slice(0, 2).join('.');
        if (cls) name += '.' + cls;
      }
      parts.unshift(name);
      el = el.parentElement;
    }
    return parts.join(' > ');
  };

  const hoverBox = document.createElement('div');
  hoverBox.style.position = 'fixed';
  hoverBox.style.border = '2px solid #ff3b30';
  hoverBox.style.background = 'rgba(255, 59, 48, 0.1)';
  hoverBox.style.pointerEvents = 'none';
  hoverBox.style.zIndex = '2147483647';
  document.body.appendChild(hoverBox);

  const tooltip = document.createElement('div');
  tooltip.style.position = 'fixed';
  tooltip.style.padding = '4px 6px';
  tooltip.style.background = '#111';
  tooltip.style.color = '#fff';
  tooltip.style.font = '12px monospace';
  tooltip.style.pointerEvents = 'none';
  tooltip.style.zIndex = '2147483647';
  document.body.appendChild(tooltip);

  return new Promise((resolve) => {
    const onMove = (e) => {
      const r = e.target.getBoundingClientRect();
      hoverBox.style.left = r.left + 'px';
      hoverBox.style.top = r.top + 'px';
      hoverBox.style.width = r.width + 'px';
      hoverBox.style.height = r.height + 'px';
      const selector = getSelector(e.target);
      tooltip.textContent = selector;
      tooltip.style.left = (e.clientX + 14) + 'px';
      tooltip.style.top = (e.clientY + 14) + 'px';
    };

    const onClick = (e) => {
      e.preventDefault();
      e.stopPropagation();
      const selector = getSelector(e.target);
      navigator.clipboard?.writeText(selector).catch(() => {});
      teardown();
      resolve({ selector });
    };

    const teardown = () => {
      window.removeEventListener('mousemove', onMove, true);
      window.removeEventListener('click', onClick, true);
      hoverBox.remove();
      tooltip.remove();
      window.__headwatchPickActive = false;
    };

    window.addEventListener('mousemove', onMove, true);
    window.addEventListener('click', onClick, true);
  });
})()
"#;

/// Result of a picking session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The operator clicked an element
    Picked(String),
    /// A picking session was already running on this page
    AlreadyActive,
}

#[derive(Debug, Deserialize)]
struct PickResponse {
    #[serde(default)]
    selector: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Run a picking session on a live page and wait for the operator's click.
/// Suspends indefinitely until the session resolves.
pub async fn pick(page: &Page) -> Result<PickOutcome> {
    let response: PickResponse = page.evaluate_promise(PICKER_SCRIPT).await?;

    if response.reason.as_deref() == Some(ALREADY_ACTIVE) {
        return Ok(PickOutcome::AlreadyActive);
    }

    Ok(PickOutcome::Picked(response.selector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_guarded_against_concurrent_sessions() {
        assert!(PICKER_SCRIPT.contains("window.__headwatchPickActive"));
        assert!(PICKER_SCRIPT.contains("already-active"));
        // The guard is cleared on teardown so a later pick can run
        assert!(PICKER_SCRIPT.contains("window.__headwatchPickActive = false"));
    }

    #[test]
    fn script_tears_down_injected_nodes_and_listeners() {
        assert!(PICKER_SCRIPT.contains("hoverBox.remove()"));
        assert!(PICKER_SCRIPT.contains("tooltip.remove()"));
        assert!(PICKER_SCRIPT.contains("removeEventListener('mousemove', onMove, true)"));
        assert!(PICKER_SCRIPT.contains("removeEventListener('click', onClick, true)"));
    }

    #[test]
    fn already_active_response_decodes() {
        let response: PickResponse =
            serde_json::from_str(r#"{"selector":"","reason":"already-active"}"#).unwrap();
        assert_eq!(response.reason.as_deref(), Some(ALREADY_ACTIVE));

        let response: PickResponse =
            serde_json::from_str(r#"{"selector":"div.card > a.link"}"#).unwrap();
        assert_eq!(response.selector, "div.card > a.link");
        assert!(response.reason.is_none());
    }
}
