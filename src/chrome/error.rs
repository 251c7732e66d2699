use std::fmt;
use std::path::PathBuf;

/// Errors while provisioning, launching or probing the browser.
#[derive(Debug)]
pub enum ChromeError {
    /// No browser build is published for this OS/architecture.
    UnsupportedPlatform(String),

    /// A configured executable does not exist.
    NotFound(PathBuf),

    /// The archive could not be fetched.
    Download(String),

    /// The archive could not be unpacked.
    Extract(String),

    /// Unpacking finished but the expected executable is absent.
    MissingAfterExtract(PathBuf),

    LaunchFailed(String),

    /// The status endpoint never answered.
    StartupTimeout { port: u16 },

    /// The status endpoint answered with something unusable.
    HttpError(String),

    ParseError(String),

    Io(std::io::Error),
}

impl fmt::Display for ChromeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPlatform(platform) => {
                write!(f, "unsupported platform: {platform}")
            }
            Self::NotFound(path) => {
                write!(f, "browser executable not found: {}", path.display())
            }
            Self::Download(msg) => write!(f, "failed to download Chromium: {msg}"),
            Self::Extract(msg) => write!(f, "failed to extract Chromium: {msg}"),
            Self::MissingAfterExtract(path) => write!(
                f,
                "Chromium executable not found after extraction at {}",
                path.display()
            ),
            Self::LaunchFailed(msg) => write!(f, "browser launch failed: {msg}"),
            Self::StartupTimeout { port } => {
                write!(f, "browser did not start listening on port {port} in time")
            }
            Self::HttpError(msg) => write!(f, "browser status endpoint error: {msg}"),
            Self::ParseError(msg) => write!(f, "browser status parse error: {msg}"),
            Self::Io(e) => write!(f, "browser I/O error: {e}"),
        }
    }
}

impl std::error::Error for ChromeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChromeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ChromeError> for crate::error::AppError {
    fn from(e: ChromeError) -> Self {
        use crate::error::ExitCode;
        let code = match &e {
            ChromeError::LaunchFailed(_) | ChromeError::HttpError(_) => ExitCode::ConnectionError,
            ChromeError::StartupTimeout { .. } => ExitCode::TimeoutError,
            ChromeError::UnsupportedPlatform(_)
            | ChromeError::NotFound(_)
            | ChromeError::Download(_)
            | ChromeError::Extract(_)
            | ChromeError::MissingAfterExtract(_)
            | ChromeError::ParseError(_)
            | ChromeError::Io(_) => ExitCode::GeneralError,
        };
        Self {
            message: e.to_string(),
            code,
        }
    }
}
