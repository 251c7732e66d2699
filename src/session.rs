use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything needed to reattach to a browser left running by an earlier
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub ws_url: String,
    pub profile: String,
    pub headful: bool,
    pub pid: u32,
    /// Empty until the first request opens a tab.
    #[serde(default)]
    pub target_id: String,
}

#[derive(Debug)]
pub enum SessionError {
    /// Session ids become file names, so they are restricted.
    InvalidId(String),
    Io(std::io::Error),
    InvalidFormat(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId(id) => write!(
                f,
                "invalid session id '{id}': use letters, digits, '.', '_' or '-'"
            ),
            Self::Io(e) => write!(f, "session file error: {e}"),
            Self::InvalidFormat(e) => write!(f, "invalid session file: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SessionError> for crate::error::AppError {
    fn from(e: SessionError) -> Self {
        Self {
            message: e.to_string(),
            code: crate::error::ExitCode::GeneralError,
        }
    }
}

fn validate_id(id: &str) -> Result<(), SessionError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidId(id.to_owned()))
    }
}

/// `<sessions_dir>/<id>.json`
///
/// # Errors
///
/// Returns `SessionError::InvalidId` for ids that could escape the directory.
pub fn record_path(sessions_dir: &Path, id: &str) -> Result<PathBuf, SessionError> {
    validate_id(id)?;
    Ok(sessions_dir.join(format!("{id}.json")))
}

/// Write the record atomically (temp file then rename), owner-only on Unix.
///
/// # Errors
///
/// Returns `SessionError::Io` on I/O failure.
pub fn save(sessions_dir: &Path, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
    let path = record_path(sessions_dir, id)?;
    std::fs::create_dir_all(sessions_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(sessions_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    let json = serde_json::to_string_pretty(record)
        .map_err(|e| SessionError::InvalidFormat(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// `Ok(None)` when no record exists for `id`.
///
/// # Errors
///
/// Returns `SessionError::InvalidFormat` for undecodable records.
pub fn load(sessions_dir: &Path, id: &str) -> Result<Option<SessionRecord>, SessionError> {
    let path = record_path(sessions_dir, id)?;
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| SessionError::InvalidFormat(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SessionError::Io(e)),
    }
}

/// Delete the record. A missing file is not an error.
///
/// # Errors
///
/// Returns `SessionError::Io` on other I/O errors.
pub fn remove(sessions_dir: &Path, id: &str) -> Result<(), SessionError> {
    let path = record_path(sessions_dir, id)?;
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::Io(e)),
    }
}
