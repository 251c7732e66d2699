//! Behavior that depends on how the page renders.
//!
//! Phoenix LiveView pages update over a socket, so form submits and scripts
//! often change the DOM without a navigation. Everything else is treated as
//! a conventional page.

use std::time::Duration;

use serde_json::Value;

use crate::driver::{Driver, VISIBLE_TIMEOUT};
use crate::error::AppError;

const LIVEVIEW_PROBE: &str = "document.querySelector('[data-phx-session]') !== null";
const LIVEVIEW_SETTLE: Duration = Duration::from_millis(500);
const STANDARD_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Standard,
    LiveView,
}

impl PageKind {
    /// Only a boolean `true` probe result marks a LiveView page.
    #[must_use]
    pub fn from_probe(result: Result<Value, AppError>) -> Self {
        match result {
            Ok(Value::Bool(true)) => Self::LiveView,
            _ => Self::Standard,
        }
    }
}

/// Inspect the loaded page. Never fails: anything unexpected is `Standard`.
pub async fn detect(driver: &mut Driver) -> PageKind {
    let kind = PageKind::from_probe(driver.evaluate(LIVEVIEW_PROBE).await);
    if kind == PageKind::LiveView {
        tracing::info!("Detected Phoenix LiveView page");
    }
    kind
}

/// Give a LiveView socket time to connect. A slow socket is only a warning.
pub async fn wait_connected(driver: &mut Driver) {
    if let Err(e) = driver.wait_until_visible(".phx-connected", VISIBLE_TIMEOUT).await {
        tracing::warn!("LiveView did not connect: {e}");
    }
}

/// CSS selector for submit controls inside form `form_id`.
#[must_use]
pub fn submit_selector(form_id: &str) -> String {
    format!("#{form_id} input[type='submit'], #{form_id} button[type='submit']")
}

/// Submit form `form_id` the way its page expects.
///
/// # Errors
///
/// Returns an error if the form cannot be interacted with.
pub async fn submit_form(driver: &mut Driver, kind: PageKind, form_id: &str) -> Result<(), AppError> {
    let form = format!("#{form_id}");
    match kind {
        PageKind::LiveView => {
            driver.send_keys(&form, "\r").await?;
            tokio::time::sleep(LIVEVIEW_SETTLE).await;
        }
        PageKind::Standard => {
            let submit = submit_selector(form_id);
            if driver.count(&submit).await? > 0 {
                driver.click(&submit).await?;
            } else {
                driver.send_keys(&form, "\r").await?;
            }
        }
    }
    Ok(())
}

/// Wait for whatever a user script set in motion. `before` is the page URL
/// from just before the script ran.
pub async fn after_script(driver: &mut Driver, kind: PageKind, before: &str) {
    let settle = match kind {
        PageKind::LiveView => LIVEVIEW_SETTLE,
        PageKind::Standard => STANDARD_SETTLE,
    };
    tokio::time::sleep(settle).await;

    let after = driver.current_location().await.unwrap_or_default();
    if after != before {
        tracing::info!("Navigation detected: {before} -> {after}");
        if let Err(e) = driver.wait_until_ready("body", VISIBLE_TIMEOUT).await {
            tracing::warn!("page after script did not settle: {e}");
        }
    } else if kind == PageKind::LiveView {
        tracing::info!("LiveView in-place update");
    }
}
