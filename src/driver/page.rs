use std::time::Duration;

use base64::Engine;
use serde_json::{Value, json};

use super::Driver;
use crate::error::{AppError, ExitCode};

/// Bound for visibility waits (form fields, LiveView connect).
pub const VISIBLE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quote `s` as a JavaScript string literal.
pub(super) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

fn ready_probe(selector: &str) -> String {
    format!(
        "document.readyState !== 'loading' && document.querySelector({}) !== null",
        js_string(selector)
    )
}

fn visible_probe(selector: &str) -> String {
    format!(
        r"(() => {{
    const el = document.querySelector({});
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    return el.getClientRects().length > 0;
}})()",
        js_string(selector)
    )
}

fn timeout_error(what: &str, timeout: Duration) -> AppError {
    AppError {
        message: format!("timed out after {}ms waiting for {what}", timeout.as_millis()),
        code: ExitCode::TimeoutError,
    }
}

impl Driver {
    /// Load `url` and wait for the load event of that navigation. Load
    /// events from a document committed by an earlier loader are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser reports a network failure or the
    /// load event does not arrive in time.
    pub async fn navigate(&mut self, url: &str) -> Result<(), AppError> {
        self.ensure_domain("Page").await?;
        let mut events = self
            .page
            .subscribe(&["Page.frameNavigated", "Page.loadEventFired"])
            .await?;

        let result = self
            .page
            .send_command("Page.navigate", Some(json!({ "url": url })))
            .await?;
        if let Some(error_text) = result["errorText"].as_str().filter(|t| !t.is_empty()) {
            return Err(AppError {
                message: error_text.to_string(),
                code: ExitCode::GeneralError,
            });
        }
        // Same-document navigations have no loader and fire no load event.
        let Some(loader_id) = result["loaderId"].as_str() else {
            return Ok(());
        };

        let load = async {
            let mut committed = false;
            while let Some(event) = events.recv().await {
                match event.method.as_str() {
                    "Page.frameNavigated" if event.params["frame"]["loaderId"] == loader_id => {
                        committed = true;
                    }
                    "Page.loadEventFired" if committed => return Ok(()),
                    _ => {}
                }
            }
            Err(AppError {
                message: "browser connection closed during navigation".into(),
                code: ExitCode::ConnectionError,
            })
        };

        let timeout = self.command_timeout;
        tokio::time::timeout(timeout, load)
            .await
            .unwrap_or_else(|_| Err(timeout_error("page load", timeout)))
    }

    /// Wait until the document has parsed and `selector` matches.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if that does not happen within `timeout`.
    pub async fn wait_until_ready(&mut self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        self.poll_until(&ready_probe(selector), timeout)
            .await
            .map_err(|()| timeout_error(&format!("'{selector}'"), timeout))
    }

    /// Wait until `selector` matches an element that is rendered.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if that does not happen within `timeout`.
    pub async fn wait_until_visible(&mut self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        self.poll_until(&visible_probe(selector), timeout)
            .await
            .map_err(|()| timeout_error(&format!("'{selector}' to be visible"), timeout))
    }

    /// Evaluate `probe` until it yields `true`. Evaluation errors (such as a
    /// context torn down mid-navigation) count as "not yet".
    async fn poll_until(&mut self, probe: &str, timeout: Duration) -> Result<(), ()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(Value::Bool(true)) = self.evaluate(probe).await {
                return Ok(());
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Run `expression` in the page, awaiting promises, and return its
    /// value by JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the script throws or the command fails.
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value, AppError> {
        let params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        let result = self.page.send_command("Runtime.evaluate", Some(params)).await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown error");
            return Err(AppError {
                message: format!("script error: {message}"),
                code: ExitCode::GeneralError,
            });
        }

        Ok(result["result"]["value"].clone())
    }

    /// # Errors
    ///
    /// Returns an error if the location cannot be read.
    pub async fn current_location(&mut self) -> Result<String, AppError> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Serialized `<html>` element of the current document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no root element.
    pub async fn outer_html(&mut self) -> Result<String, AppError> {
        let node_id = self.query_selector("html").await?;
        let result = self
            .page
            .send_command("DOM.getOuterHTML", Some(json!({ "nodeId": node_id })))
            .await?;
        result["outerHTML"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| AppError {
                message: "DOM.getOuterHTML returned no markup".into(),
                code: ExitCode::ProtocolError,
            })
    }

    /// PNG of the whole scrollable page, not just the viewport.
    ///
    /// # Errors
    ///
    /// Returns an error if layout metrics or the capture fail.
    pub async fn screenshot(&mut self) -> Result<Vec<u8>, AppError> {
        self.ensure_domain("Page").await?;
        let metrics = self.page.send_command("Page.getLayoutMetrics", None).await?;
        let size = if metrics["cssContentSize"].is_object() {
            &metrics["cssContentSize"]
        } else {
            &metrics["contentSize"]
        };
        let width = size["width"].as_f64().unwrap_or(0.0).ceil();
        let height = size["height"].as_f64().unwrap_or(0.0).ceil();

        let mut params = json!({
            "format": "png",
            "captureBeyondViewport": true,
            "fromSurface": true,
        });
        if width > 0.0 && height > 0.0 {
            params["clip"] = json!({ "x": 0, "y": 0, "width": width, "height": height, "scale": 1 });
        }

        let result = self
            .page
            .send_command("Page.captureScreenshot", Some(params))
            .await?;
        let data = result["data"].as_str().ok_or_else(|| AppError {
            message: "Page.captureScreenshot returned no data".into(),
            code: ExitCode::ProtocolError,
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AppError {
                message: format!("invalid screenshot data: {e}"),
                code: ExitCode::ProtocolError,
            })
    }

    /// Run `source` before any page script in every future document.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser rejects the registration.
    pub async fn add_script_on_new_document(&mut self, source: &str) -> Result<(), AppError> {
        self.ensure_domain("Page").await?;
        self.page
            .send_command(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(json!({ "source": source })),
            )
            .await?;
        Ok(())
    }

    /// Number of elements matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be evaluated.
    pub async fn count(&mut self, selector: &str) -> Result<u64, AppError> {
        let value = self
            .evaluate(&format!(
                "document.querySelectorAll({}).length",
                js_string(selector)
            ))
            .await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    /// Resolve `selector` against the current document to a DOM node id.
    pub(super) async fn query_selector(&mut self, selector: &str) -> Result<i64, AppError> {
        self.ensure_domain("DOM").await?;
        let doc = self
            .page
            .send_command("DOM.getDocument", Some(json!({ "depth": 0 })))
            .await?;
        let root = doc["root"]["nodeId"].as_i64().ok_or_else(|| AppError {
            message: "DOM.getDocument returned no root".into(),
            code: ExitCode::ProtocolError,
        })?;
        let found = self
            .page
            .send_command(
                "DOM.querySelector",
                Some(json!({ "nodeId": root, "selector": selector })),
            )
            .await?;
        match found["nodeId"].as_i64() {
            Some(id) if id > 0 => Ok(id),
            _ => Err(AppError {
                message: format!("no element matches '{selector}'"),
                code: ExitCode::TargetError,
            }),
        }
    }
}
