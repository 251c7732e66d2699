use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use zip::ZipArchive;

use super::ChromeError;
use super::platform::Platform;
use crate::paths::ToolDir;

/// Upper bound for the whole archive transfer.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const MAX_ARCHIVE_BYTES: u64 = 1024 * 1024 * 1024;

/// Return the provisioned browser, downloading it on first use.
///
/// # Errors
///
/// Returns `ChromeError::UnsupportedPlatform` off macOS/Linux, or a
/// download/extract error if provisioning fails.
pub async fn ensure_browser(
    tool_dir: &ToolDir,
    download_url: Option<&str>,
) -> Result<PathBuf, ChromeError> {
    let platform = Platform::current()?;
    let chromium_dir = tool_dir.chromium_dir();
    let executable = platform.executable_in(&chromium_dir);
    if executable.exists() {
        return Ok(executable);
    }

    let url = download_url.map_or_else(|| platform.download_url(), str::to_owned);
    install(url, chromium_dir, executable).await
}

/// Download `url`, unpack it into `chromium_dir` and check that
/// `executable` appeared.
///
/// # Errors
///
/// Returns `ChromeError::Download`, `ChromeError::Extract` or
/// `ChromeError::MissingAfterExtract`.
pub async fn install(
    url: String,
    chromium_dir: PathBuf,
    executable: PathBuf,
) -> Result<PathBuf, ChromeError> {
    tracing::info!("Chromium not found, downloading from {url}");

    let dest = chromium_dir.clone();
    tokio::task::spawn_blocking(move || {
        let archive = download(&url)?;
        tracing::info!("extracting Chromium into {}", dest.display());
        extract(archive.path(), &dest)
    })
    .await
    .map_err(|e| ChromeError::Download(format!("download task failed: {e}")))??;

    if !executable.exists() {
        return Err(ChromeError::MissingAfterExtract(executable));
    }
    make_executable(&executable)?;
    tracing::info!("Chromium installed at {}", executable.display());
    Ok(executable)
}

fn download(url: &str) -> Result<NamedTempFile, ChromeError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(DOWNLOAD_TIMEOUT))
        .build()
        .into();

    let mut response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::StatusCode(code) => ChromeError::Download(format!("bad status: {code}")),
        other => ChromeError::Download(other.to_string()),
    })?;

    let mut file = NamedTempFile::new()?;
    let mut body = response
        .body_mut()
        .with_config()
        .limit(MAX_ARCHIVE_BYTES)
        .reader();
    let bytes = std::io::copy(&mut body, &mut file)
        .map_err(|e| ChromeError::Download(format!("read error: {e}")))?;
    tracing::debug!(bytes, "archive downloaded");
    Ok(file)
}

/// Unpack a zip archive, keeping its directory layout and Unix modes.
fn extract(archive_path: &Path, dest: &Path) -> Result<(), ChromeError> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ChromeError::Extract(format!("bad archive: {e}")))?;
    archive
        .extract(dest)
        .map_err(|e| ChromeError::Extract(e.to_string()))
}

fn make_executable(path: &Path) -> Result<(), ChromeError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        if perms.mode() & 0o111 == 0 {
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms)?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
