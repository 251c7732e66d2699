//! One request end to end: open a tab, drive it, capture, shut down.

use std::time::Duration;

use crate::cli::{FormInput, RequestConfig};
use crate::console::{self, ConsoleLog};
use crate::driver::{BrowserOptions, Driver, VISIBLE_TIMEOUT};
use crate::error::AppError;
use crate::framework::{self, PageKind};
use crate::markdown;
use crate::paths::ToolDir;
use crate::stealth;

const BANNER_RULE: &str = "==========================";
const CONSOLE_RULE_WIDTH: usize = 50;

/// How long to wait for the console collector to drain after teardown.
const COLLECTOR_GRACE: Duration = Duration::from_millis(250);

/// Fetch `request.url` and return what should be printed on stdout.
///
/// # Errors
///
/// Returns an error if a required step fails or the whole request takes
/// longer than `request_timeout`.
pub async fn fetch(
    request: &RequestConfig,
    browser: &BrowserOptions,
    tool_dir: &ToolDir,
    request_timeout: Duration,
) -> Result<String, AppError> {
    // On expiry the in-flight future is dropped, which closes the
    // connection and kills a one-shot browser.
    tokio::time::timeout(request_timeout, run(request, browser, tool_dir))
        .await
        .unwrap_or_else(|_| Err(AppError::request_timeout(request_timeout.as_secs())))
}

async fn run(
    request: &RequestConfig,
    browser: &BrowserOptions,
    tool_dir: &ToolDir,
) -> Result<String, AppError> {
    let mut driver = match &request.session {
        Some(id) => Driver::open_session(browser, tool_dir, id).await?,
        None => Driver::launch(browser, tool_dir).await?,
    };

    let log = ConsoleLog::new();
    let collector = match driver.console_events().await {
        Ok(rx) => Some(console::spawn_collector(rx, log.clone())),
        Err(e) => {
            tracing::warn!("console output will not be captured: {e}");
            None
        }
    };

    let captured = drive(&mut driver, request, browser.command_timeout).await;
    driver.close().await;
    if let Some(handle) = collector {
        let _ = tokio::time::timeout(COLLECTOR_GRACE, handle).await;
    }
    let html = captured?;

    if request.raw {
        return Ok(html);
    }
    let body = markdown::render(&html, request.truncate_after);
    Ok(assemble_output(&request.url, &body, &log.snapshot()))
}

/// Steps between opening the tab and capturing its markup.
async fn drive(
    driver: &mut Driver,
    request: &RequestConfig,
    load_timeout: Duration,
) -> Result<String, AppError> {
    if request.stealth
        && let Err(e) = driver.add_script_on_new_document(stealth::SCRIPT).await
    {
        tracing::warn!("could not inject stealth script: {e}");
    }

    driver
        .navigate(&request.url)
        .await
        .map_err(|e| e.context(format!("could not navigate to {}", request.url)))?;
    driver
        .wait_until_ready("body", load_timeout)
        .await
        .map_err(|e| e.context("page did not load"))?;

    let kind = framework::detect(driver).await;
    if kind == PageKind::LiveView {
        framework::wait_connected(driver).await;
    }

    if let Some(form_id) = &request.form_id
        && !request.inputs.is_empty()
    {
        fill_form(driver, kind, form_id, &request.inputs)
            .await
            .map_err(|e| e.context("error handling form"))?;
    }

    if let Some(script) = &request.script {
        let before = driver.current_location().await.unwrap_or_default();
        if let Err(e) = driver.evaluate(script).await {
            tracing::warn!("JavaScript execution failed: {e}");
        }
        framework::after_script(driver, kind, &before).await;
    }

    if let Some(path) = &request.screenshot {
        let png = driver
            .screenshot()
            .await
            .map_err(|e| e.context("error taking screenshot"))?;
        std::fs::write(path, png)
            .map_err(|e| AppError::from(e).context("error saving screenshot"))?;
        tracing::info!("Screenshot saved to {}", path.display());
    }

    if let Some(url) = &request.after_submit {
        tracing::info!("Navigating to after-submit URL: {url}");
        driver
            .navigate(url)
            .await
            .map_err(|e| e.context("could not navigate to after-submit URL"))?;
        let settle = load_timeout.min(VISIBLE_TIMEOUT);
        if let Err(e) = driver.wait_until_ready("body", settle).await {
            tracing::warn!("after-submit page did not settle: {e}");
        }
    }

    driver
        .outer_html()
        .await
        .map_err(|e| e.context("could not get page content"))
}

/// Selector for the field named `name` inside form `form_id`.
#[must_use]
pub fn field_selector(form_id: &str, name: &str) -> String {
    format!("#{form_id} input[name='{name}']")
}

async fn fill_form(
    driver: &mut Driver,
    kind: PageKind,
    form_id: &str,
    inputs: &[FormInput],
) -> Result<(), AppError> {
    for input in inputs {
        driver
            .fill(&field_selector(form_id, &input.name), &input.value)
            .await
            .map_err(|e| e.context(format!("could not fill input {}", input.name)))?;
    }
    framework::submit_form(driver, kind, form_id).await?;
    tracing::info!("Form submitted");
    Ok(())
}

/// Banner, body, and the captured console output if there is any.
#[must_use]
pub fn assemble_output(url: &str, body: &str, console: &[String]) -> String {
    let mut out = format!("{BANNER_RULE}\n{url}\n{BANNER_RULE}\n\n{body}");
    if !console.is_empty() {
        let rule = "=".repeat(CONSOLE_RULE_WIDTH);
        out.push_str(&format!("\n\n{rule}\nCONSOLE OUTPUT:\n{rule}\n"));
        for message in console {
            out.push_str(message);
            out.push('\n');
        }
    }
    out
}
