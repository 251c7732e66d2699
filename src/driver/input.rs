use serde_json::json;

use super::Driver;
use super::page::VISIBLE_TIMEOUT;
use crate::error::{AppError, ExitCode};

/// Empties a form control through the native value setter so frameworks that
/// track input state see the change.
const CLEAR_JS: &str = r"
function() {
    const el = this;
    if (el.type === 'checkbox' || el.type === 'radio') {
        el.checked = false;
    } else if (el.tagName.toLowerCase() === 'select') {
        el.selectedIndex = 0;
    } else {
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : HTMLInputElement.prototype;
        const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
        if (setter) {
            setter.call(el, '');
        } else {
            el.value = '';
        }
    }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
}
";

fn interaction_failed(action: &str, detail: impl std::fmt::Display) -> AppError {
    AppError {
        message: format!("{action} failed: {detail}"),
        code: ExitCode::ProtocolError,
    }
}

/// Pieces of `text` as typed: runs of characters, with line breaks pulled
/// out as Enter presses.
#[derive(Debug, PartialEq, Eq)]
enum Keystroke<'a> {
    Text(&'a str),
    Enter,
}

fn keystrokes(text: &str) -> Vec<Keystroke<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if ch == '\r' || ch == '\n' {
            if start < idx {
                out.push(Keystroke::Text(&text[start..idx]));
            }
            out.push(Keystroke::Enter);
            start = idx + ch.len_utf8();
        }
    }
    if start < text.len() {
        out.push(Keystroke::Text(&text[start..]));
    }
    out
}

/// Center of a `DOM.getBoxModel` content quad.
fn quad_center(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() < 8 {
        return None;
    }
    let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
    let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
    Some((x, y))
}

impl Driver {
    /// Replace the value of the field at `selector` with `value`, typed as
    /// keystrokes.
    ///
    /// # Errors
    ///
    /// Returns an error if the field never becomes visible or cannot be
    /// cleared or typed into.
    pub async fn fill(&mut self, selector: &str, value: &str) -> Result<(), AppError> {
        self.wait_until_visible(selector, VISIBLE_TIMEOUT).await?;
        self.clear(selector).await?;
        self.send_keys(selector, value).await
    }

    async fn clear(&mut self, selector: &str) -> Result<(), AppError> {
        let node_id = self.query_selector(selector).await?;
        let resolved = self
            .page
            .send_command("DOM.resolveNode", Some(json!({ "nodeId": node_id })))
            .await
            .map_err(|e| interaction_failed("resolve", e))?;
        let object_id = resolved["object"]["objectId"]
            .as_str()
            .ok_or_else(|| interaction_failed("resolve", "no objectId returned"))?;

        let params = json!({
            "objectId": object_id,
            "functionDeclaration": CLEAR_JS,
            "arguments": [],
        });
        self.page
            .send_command("Runtime.callFunctionOn", Some(params))
            .await
            .map_err(|e| interaction_failed("clear", e))?;
        Ok(())
    }

    /// Focus `selector` and type `text`. `\r` and `\n` press Enter.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing or a key event fails.
    pub async fn send_keys(&mut self, selector: &str, text: &str) -> Result<(), AppError> {
        let node_id = self.query_selector(selector).await?;
        self.page
            .send_command("DOM.focus", Some(json!({ "nodeId": node_id })))
            .await
            .map_err(|e| interaction_failed("focus", e))?;

        for stroke in keystrokes(text) {
            match stroke {
                Keystroke::Text(run) => {
                    self.page
                        .send_command("Input.insertText", Some(json!({ "text": run })))
                        .await
                        .map_err(|e| interaction_failed("type", e))?;
                }
                Keystroke::Enter => self.press_enter().await?,
            }
        }
        Ok(())
    }

    async fn press_enter(&mut self) -> Result<(), AppError> {
        for kind in ["keyDown", "keyUp"] {
            let mut params = json!({
                "type": kind,
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
                "nativeVirtualKeyCode": 13,
            });
            if kind == "keyDown" {
                params["text"] = json!("\r");
            }
            self.page
                .send_command("Input.dispatchKeyEvent", Some(params))
                .await
                .map_err(|e| interaction_failed("key press", e))?;
        }
        Ok(())
    }

    /// Left-click the center of the first element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing or has no layout box.
    pub async fn click(&mut self, selector: &str) -> Result<(), AppError> {
        let node_id = self.query_selector(selector).await?;
        self.page
            .send_command("DOM.scrollIntoViewIfNeeded", Some(json!({ "nodeId": node_id })))
            .await
            .map_err(|e| interaction_failed("scroll into view", e))?;

        let model = self
            .page
            .send_command("DOM.getBoxModel", Some(json!({ "nodeId": node_id })))
            .await
            .map_err(|e| interaction_failed("get box model", e))?;
        let quad: Vec<f64> = model["model"]["content"]
            .as_array()
            .map(|points| points.iter().filter_map(serde_json::Value::as_f64).collect())
            .unwrap_or_default();
        let (x, y) = quad_center(&quad).ok_or_else(|| AppError {
            message: format!("element '{selector}' has no size"),
            code: ExitCode::TargetError,
        })?;

        for kind in ["mousePressed", "mouseReleased"] {
            let params = json!({
                "type": kind,
                "x": x,
                "y": y,
                "button": "left",
                "clickCount": 1,
            });
            self.page
                .send_command("Input.dispatchMouseEvent", Some(params))
                .await
                .map_err(|e| interaction_failed("click", e))?;
        }
        Ok(())
    }
}
