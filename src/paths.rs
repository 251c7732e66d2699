use std::path::{Path, PathBuf};

use crate::error::{AppError, ExitCode};

/// Environment variable that relocates the per-user tool directory.
pub const HOME_ENV: &str = "SURF_HOME";

/// Layout of `~/.surf`:
///
/// ```text
/// chromium/            unpacked browser build
/// profiles/<name>/     browser user-data directories
/// sessions/<id>.json   persistent session records
/// config.toml          optional defaults
/// ```
#[derive(Debug, Clone)]
pub struct ToolDir {
    root: PathBuf,
}

impl ToolDir {
    /// `$SURF_HOME` if set, else `~/.surf`.
    ///
    /// # Errors
    ///
    /// Fails when neither is available.
    pub fn resolve() -> Result<Self, AppError> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::at(root));
        }
        dirs::home_dir()
            .map(|home| Self::at(home.join(".surf")))
            .ok_or_else(|| AppError {
                message: "could not determine home directory".into(),
                code: ExitCode::GeneralError,
            })
    }

    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn chromium_dir(&self) -> PathBuf {
        self.root.join("chromium")
    }

    #[must_use]
    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.root.join("profiles").join(profile)
    }

    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
