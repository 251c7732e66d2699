use std::time::Duration;

use serde::Deserialize;

use super::ChromeError;

/// Per-probe bound; startup polling retries on failure.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Subset of the browser's `/json/version` document.
#[derive(Debug, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser", default)]
    pub browser: String,

    /// Browser-level control channel address.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_debugger_url: String,
}

/// Ask the browser listening on `127.0.0.1:port` for its control channel.
///
/// # Errors
///
/// Returns `ChromeError::HttpError` if nothing answers and
/// `ChromeError::ParseError` if the answer is not the expected document.
pub async fn query_version(port: u16) -> Result<BrowserVersion, ChromeError> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let body = tokio::task::spawn_blocking(move || http_get(&url))
        .await
        .map_err(|e| ChromeError::HttpError(format!("probe task failed: {e}")))??;
    parse_version(&body)
}

fn http_get(url: &str) -> Result<String, ChromeError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(PROBE_TIMEOUT))
        .build()
        .into();
    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| ChromeError::HttpError(e.to_string()))?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| ChromeError::HttpError(e.to_string()))
}

fn parse_version(body: &str) -> Result<BrowserVersion, ChromeError> {
    serde_json::from_str(body).map_err(|e| ChromeError::ParseError(e.to_string()))
}
