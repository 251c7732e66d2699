use std::path::{Path, PathBuf};

use super::ChromeError;

/// Environment variable pointing at a browser to use instead of the
/// provisioned build.
pub const CHROME_PATH_ENV: &str = "SURF_CHROME_PATH";

const DOWNLOAD_BASE: &str = "https://playwright.azureedge.net/builds/chromium/1200";

/// Targets for which a prebuilt Chromium archive exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacArm64,
    MacX64,
    Linux,
}

impl Platform {
    /// # Errors
    ///
    /// Returns `ChromeError::UnsupportedPlatform` on anything other than
    /// macOS or Linux.
    pub fn current() -> Result<Self, ChromeError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn from_parts(os: &str, arch: &str) -> Result<Self, ChromeError> {
        match (os, arch) {
            ("macos", "aarch64") => Ok(Self::MacArm64),
            ("macos", _) => Ok(Self::MacX64),
            ("linux", _) => Ok(Self::Linux),
            _ => Err(ChromeError::UnsupportedPlatform(format!("{os}/{arch}"))),
        }
    }

    /// Executable location relative to the unpack directory.
    #[must_use]
    pub fn executable_in(self, chromium_dir: &Path) -> PathBuf {
        const MAC_APP: &str =
            "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
        match self {
            Self::MacArm64 => chromium_dir.join("chrome-mac-arm64").join(MAC_APP),
            Self::MacX64 => chromium_dir.join("chrome-mac").join(MAC_APP),
            Self::Linux => chromium_dir.join("chrome-linux").join("chrome"),
        }
    }

    #[must_use]
    pub fn download_url(self) -> String {
        let archive = match self {
            Self::MacArm64 => "chromium-mac-arm64.zip",
            Self::MacX64 => "chromium-mac.zip",
            Self::Linux => "chromium-linux.zip",
        };
        format!("{DOWNLOAD_BASE}/{archive}")
    }
}

/// The executable to use in place of provisioning, if one is configured.
///
/// `$SURF_CHROME_PATH` wins over the config file's `browser.executable`.
///
/// # Errors
///
/// Returns `ChromeError::NotFound` when the configured path does not exist.
pub fn executable_override(configured: Option<&Path>) -> Result<Option<PathBuf>, ChromeError> {
    let env_override = std::env::var_os(CHROME_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    override_from(env_override.as_deref(), configured)
}

fn override_from(
    env_override: Option<&Path>,
    configured: Option<&Path>,
) -> Result<Option<PathBuf>, ChromeError> {
    match env_override.or(configured) {
        Some(p) if p.exists() => Ok(Some(p.to_path_buf())),
        Some(p) => Err(ChromeError::NotFound(p.to_path_buf())),
        None => Ok(None),
    }
}
