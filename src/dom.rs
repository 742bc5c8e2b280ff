use anyhow::{Result, anyhow};
use headless_chrome::Tab;
use std::sync::Arc;
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// `timeOrigin` is fixed for the lifetime of a document, so it tells an old
/// page that still reports `complete` apart from the one that replaces it.
const PAGE_MARKER_JS: &str = "String(performance.timeOrigin)";

/// Fills the first text or search input. Returns whether a field was found.
///
/// The value is dispatched as `input` and `change` events so pages built on
/// client-side frameworks notice the update.
const TYPE_JS: &str = r#"
((value) => {
  const inputs = document.querySelectorAll('input[type="text" i], input[type="search" i]');
  if (inputs.length === 0) return false;
  const field = inputs[0];
  field.focus();
  field.value = value;
  field.dispatchEvent(new Event('input', { bubbles: true }));
  field.dispatchEvent(new Event('change', { bubbles: true }));
  field.blur();
  return true;
})(__ARG__)
"#;

/// Clicks the first button whose visible text contains the (lower-cased)
/// needle. Returns whether anything was clicked.
const CLICK_JS: &str = r#"
((needle) => {
  for (const button of document.getElementsByTagName('button')) {
    const text = (button.innerText || button.textContent || '').toLowerCase();
    if (text.includes(needle)) {
      button.click();
      return true;
    }
  }
  return false;
})(__ARG__)
"#;

fn with_argument(script: &str, arg: &str) -> Result<String> {
    let literal = serde_json::to_string(arg)?;
    Ok(script.replace("__ARG__", &literal))
}

fn evaluate_bool(tab: &Arc<Tab>, script: &str) -> Result<bool> {
    let result = tab.evaluate(script, false)?;
    result
        .value
        .and_then(|v| v.as_bool())
        .ok_or_else(|| anyhow!("script did not return a boolean"))
}

/// Get the current page URL.
pub fn get_current_url(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("window.location.href", false)?;
    result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| anyhow!("page did not report its location"))
}

pub fn type_into_first_text_field(tab: &Arc<Tab>, value: &str) -> Result<bool> {
    evaluate_bool(tab, &with_argument(TYPE_JS, value)?)
}

pub fn click_button_containing(tab: &Arc<Tab>, needle: &str) -> Result<bool> {
    evaluate_bool(tab, &with_argument(CLICK_JS, &needle.to_lowercase())?)
}

/// Identifies the current document. Changes whenever a new document commits.
pub fn page_marker(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate(PAGE_MARKER_JS, false)?;
    result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| anyhow!("page did not report a marker"))
}

/// Poll `document.readyState` until it is `complete` or `timeout` elapses.
///
/// Evaluation errors while a navigation is committing count as not ready.
pub fn wait_until_complete(tab: &Arc<Tab>, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if is_complete(tab) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        std::thread::sleep(READY_POLL_INTERVAL);
    }
}

/// Poll until the document marker differs from `previous`. Returns `false`
/// when the same document is still showing after `timeout`.
pub fn wait_for_new_page(tab: &Arc<Tab>, previous: &str, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(marker) = page_marker(tab) {
            if marker != previous {
                return Ok(true);
            }
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        std::thread::sleep(READY_POLL_INTERVAL);
    }
}

fn is_complete(tab: &Arc<Tab>) -> bool {
    tab.evaluate("document.readyState", false)
        .ok()
        .and_then(|state| state.value)
        .is_some_and(|v| v.as_str() == Some("complete"))
}
