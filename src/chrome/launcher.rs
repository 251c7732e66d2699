use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use super::ChromeError;
use super::discovery::{BrowserVersion, query_version};
use crate::stealth;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Flags that keep a headless browser stable and quiet in automation.
const STABILITY_FLAGS: &[&str] = &[
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-background-timer-throttling",
    "--disable-extensions",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--no-first-run",
    "--no-default-browser-check",
];

pub struct LaunchConfig {
    pub executable: PathBuf,
    pub port: u16,
    /// Profile directory; created if missing.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub window_size: Option<(u32, u32)>,
    pub stealth: bool,
    /// Put the browser in its own process group so it outlives this process.
    pub detached: bool,
}

/// Command-line arguments for a launch, in order.
#[must_use]
pub fn browser_args(config: &LaunchConfig) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", config.port),
        format!("--user-data-dir={}", config.user_data_dir.display()),
    ];
    args.extend(STABILITY_FLAGS.iter().map(|f| (*f).to_string()));

    if config.headless {
        args.push("--headless=new".into());
    }
    if let Some((w, h)) = config.window_size {
        args.push(format!("--window-size={w},{h}"));
    }
    if config.stealth {
        args.push("--disable-blink-features=AutomationControlled".into());
        args.push(format!("--user-agent={}", stealth::USER_AGENT));
    }
    args.push("about:blank".into());
    args
}

/// A launched browser. Dropping it kills the process unless it was
/// [`detach`](Self::detach)ed.
pub struct ChromeProcess {
    child: Option<std::process::Child>,
    port: u16,
}

impl ChromeProcess {
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.as_ref().map_or(0, std::process::Child::id)
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.child = None;
    }

    /// Give the browser `grace` to exit on its own, then kill it.
    pub async fn shutdown(mut self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        while let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(Some(_))) {
                self.child = None;
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        self.kill();
    }

    /// Release ownership so the browser keeps running. Returns `(pid, port)`.
    #[must_use]
    pub fn detach(mut self) -> (u32, u16) {
        let pid = self.pid();
        self.child = None;
        (pid, self.port)
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Find an available TCP port on localhost.
///
/// # Errors
///
/// Returns `ChromeError::LaunchFailed` if binding fails.
pub fn find_available_port() -> Result<u16, ChromeError> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").map_err(|e| {
        ChromeError::LaunchFailed(format!("could not bind to find a free port: {e}"))
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| ChromeError::LaunchFailed(format!("could not get local address: {e}")))?
        .port();
    Ok(port)
}

/// Spawn the browser and poll its status endpoint until the control channel
/// is advertised.
///
/// # Errors
///
/// Returns `ChromeError::LaunchFailed` if the process cannot be spawned or
/// exits early, or `ChromeError::StartupTimeout` if it never becomes ready.
pub async fn launch_chrome(
    config: &LaunchConfig,
    timeout: Duration,
) -> Result<(ChromeProcess, BrowserVersion), ChromeError> {
    std::fs::create_dir_all(&config.user_data_dir)?;

    let mut cmd = Command::new(&config.executable);
    cmd.args(browser_args(config))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    if config.detached {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    tracing::debug!(executable = %config.executable.display(), port = config.port, "launching browser");
    let child = cmd.spawn().map_err(|e| {
        ChromeError::LaunchFailed(format!("failed to spawn {}: {e}", config.executable.display()))
    })?;

    let mut process = ChromeProcess {
        child: Some(child),
        port: config.port,
    };

    let start = tokio::time::Instant::now();
    loop {
        if start.elapsed() > timeout {
            process.kill();
            return Err(ChromeError::StartupTimeout { port: config.port });
        }

        if let Some(child) = process.child.as_mut()
            && let Ok(Some(status)) = child.try_wait()
        {
            process.child = None;
            return Err(ChromeError::LaunchFailed(format!(
                "browser exited with status {status} before becoming ready"
            )));
        }

        if let Ok(version) = query_version(config.port).await {
            return Ok((process, version));
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Interrupt a detached browser, then force-kill it after a short grace
/// period. Processes that are already gone are ignored.
pub async fn terminate(pid: u32) {
    #[cfg(unix)]
    {
        // A pid above i32::MAX would wrap negative and address a process group.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return;
        };
        if pid <= 1 {
            return;
        }
        // SAFETY: kill(2) has no memory-safety preconditions.
        unsafe {
            libc::kill(pid, libc::SIGINT);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    tracing::warn!(pid, "cannot signal browser process on this platform");
}
