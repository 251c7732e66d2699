//! One controlled browser tab per request.
//!
//! A [`Driver`] either owns a freshly launched browser (one-shot) or is
//! attached to a named session's browser, which outlives the process.

mod input;
mod page;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cdp::{CdpClient, CdpConfig, CdpError, CdpEvent, CdpSession};
use crate::chrome::{self, ChromeError, ChromeProcess, LaunchConfig};
use crate::console;
use crate::error::{AppError, ExitCode};
use crate::paths::ToolDir;
use crate::session::{self, SessionRecord};

pub use page::VISIBLE_TIMEOUT;

/// Attempts with a fresh port when the browser fails to bind.
const MAX_PORT_RETRIES: u8 = 3;

/// How the browser should be launched if one is needed.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub executable: PathBuf,
    pub profile: String,
    pub headful: bool,
    pub window_size: Option<(u32, u32)>,
    pub stealth: bool,
    pub startup_timeout: Duration,
    pub command_timeout: Duration,
}

impl BrowserOptions {
    fn cdp_config(&self) -> CdpConfig {
        CdpConfig {
            command_timeout: self.command_timeout,
            ..CdpConfig::default()
        }
    }

    fn launch_config(&self, tool_dir: &ToolDir, port: u16, detached: bool) -> LaunchConfig {
        LaunchConfig {
            executable: self.executable.clone(),
            port,
            user_data_dir: tool_dir.profile_dir(&self.profile),
            headless: !self.headful,
            window_size: self.window_size,
            stealth: self.stealth,
            detached,
        }
    }
}

enum Lifetime {
    /// Browser is killed at teardown.
    Owned(ChromeProcess),
    /// Browser and tab stay up for the next invocation.
    Session,
}

pub struct Driver {
    client: CdpClient,
    page: CdpSession,
    lifetime: Lifetime,
    enabled_domains: HashSet<&'static str>,
    command_timeout: Duration,
}

impl Driver {
    /// Launch a private browser for a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be started or a tab cannot be
    /// opened on it.
    pub async fn launch(opts: &BrowserOptions, tool_dir: &ToolDir) -> Result<Self, AppError> {
        let (process, ws_url) = launch_with_retries(opts, tool_dir, false).await?;
        let client = CdpClient::connect(&ws_url, opts.cdp_config()).await?;
        let target_id = client.create_target("about:blank").await?;
        let page = client.attach(&target_id).await?;
        Ok(Self::new(client, page, Lifetime::Owned(process), opts.command_timeout))
    }

    /// Reuse the named session's browser, starting one if the session does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started, reached, or
    /// attached to.
    pub async fn open_session(
        opts: &BrowserOptions,
        tool_dir: &ToolDir,
        id: &str,
    ) -> Result<Self, AppError> {
        let sessions_dir = tool_dir.sessions_dir();
        let record = if let Some(record) = session::load(&sessions_dir, id)? {
            tracing::info!("Connecting to session '{id}'...");
            record
        } else {
            tracing::info!("Starting new session '{id}'...");
            let (process, ws_url) = launch_with_retries(opts, tool_dir, true).await?;
            let (pid, _port) = process.detach();
            let record = SessionRecord {
                ws_url,
                profile: opts.profile.clone(),
                headful: opts.headful,
                pid,
                target_id: String::new(),
            };
            session::save(&sessions_dir, id, &record)?;
            record
        };

        Self::attach_session(&sessions_dir, id, record, opts.cdp_config())
            .await
            .map_err(|e| {
                if e.code == ExitCode::ConnectionError {
                    AppError {
                        message: format!(
                            "session '{id}' is not reachable ({}); run `surf --session {id} --stop` to clear it",
                            e.message
                        ),
                        code: e.code,
                    }
                } else {
                    e
                }
            })
    }

    /// Connect to a session's browser and bind its tab. A record without a
    /// tab gets a new one, persisted before returning.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the browser is gone, or a session
    /// error if the record cannot be saved.
    pub async fn attach_session(
        sessions_dir: &Path,
        id: &str,
        mut record: SessionRecord,
        cdp_config: CdpConfig,
    ) -> Result<Self, AppError> {
        let command_timeout = cdp_config.command_timeout;
        let client = CdpClient::connect(&record.ws_url, cdp_config).await?;

        let page = if record.target_id.is_empty() {
            None
        } else {
            match client.attach(&record.target_id).await {
                Ok(page) => Some(page),
                Err(CdpError::Protocol { message, .. }) => {
                    tracing::warn!(
                        "session tab {} is gone ({message}), opening a new one",
                        record.target_id
                    );
                    None
                }
                Err(e) => return Err(e.into()),
            }
        };

        let page = match page {
            Some(page) => page,
            None => {
                let target_id = client.create_target("about:blank").await?;
                let page = client.attach(&target_id).await?;
                record.target_id = target_id;
                session::save(sessions_dir, id, &record)?;
                page
            }
        };

        Ok(Self::new(client, page, Lifetime::Session, command_timeout))
    }

    fn new(
        client: CdpClient,
        page: CdpSession,
        lifetime: Lifetime,
        command_timeout: Duration,
    ) -> Self {
        Self {
            client,
            page,
            lifetime,
            enabled_domains: HashSet::new(),
            command_timeout,
        }
    }

    #[must_use]
    pub fn target_id(&self) -> &str {
        self.page.target_id()
    }

    /// Console and exception events for this tab on one ordered stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription or `Runtime.enable` fails.
    pub async fn console_events(&mut self) -> Result<mpsc::Receiver<CdpEvent>, AppError> {
        // Subscribe first so messages replayed by Runtime.enable are kept.
        let rx = self.page.subscribe(&console::EVENTS).await?;
        self.ensure_domain("Runtime").await?;
        Ok(rx)
    }

    /// Enable a CDP domain once per driver.
    async fn ensure_domain(&mut self, domain: &'static str) -> Result<(), CdpError> {
        if self.enabled_domains.contains(domain) {
            return Ok(());
        }
        self.page
            .send_command(&format!("{domain}.enable"), None)
            .await?;
        self.enabled_domains.insert(domain);
        Ok(())
    }

    /// Release the browser. One-shot browsers are blanked, closed and
    /// reaped. Session browsers are left running.
    pub async fn close(self) {
        match self.lifetime {
            Lifetime::Owned(process) => {
                let _ = self
                    .page
                    .send_command("Page.navigate", Some(serde_json::json!({ "url": "about:blank" })))
                    .await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = self.client.send_command("Browser.close", None).await;
                let _ = self.client.close().await;
                process.shutdown(Duration::from_millis(500)).await;
            }
            Lifetime::Session => {
                let _ = self.client.close().await;
            }
        }
    }
}

async fn launch_with_retries(
    opts: &BrowserOptions,
    tool_dir: &ToolDir,
    detached: bool,
) -> Result<(ChromeProcess, String), AppError> {
    let mut last_err = None;
    for _ in 0..MAX_PORT_RETRIES {
        let port = chrome::find_available_port()?;
        let config = opts.launch_config(tool_dir, port, detached);
        match chrome::launch_chrome(&config, opts.startup_timeout).await {
            Ok((process, version)) => return Ok((process, version.ws_debugger_url)),
            Err(e @ ChromeError::LaunchFailed(_)) => last_err = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(last_err
        .unwrap_or_else(|| ChromeError::LaunchFailed("all port retries exhausted".into()))
        .into())
}

/// Shut down a named session's browser and forget it.
///
/// # Errors
///
/// Returns `session '<id>' not found` if no record exists.
pub async fn stop_session(tool_dir: &ToolDir, id: &str) -> Result<(), AppError> {
    let sessions_dir = tool_dir.sessions_dir();
    let record = session::load(&sessions_dir, id)?.ok_or_else(|| AppError::session_not_found(id))?;
    tracing::debug!(pid = record.pid, "stopping session browser");
    chrome::terminate(record.pid).await;
    session::remove(&sessions_dir, id)?;
    Ok(())
}
