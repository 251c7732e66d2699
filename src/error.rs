use std::fmt;

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConnectionError = 2,
    TargetError = 3,
    TimeoutError = 4,
    ProtocolError = 5,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::GeneralError => write!(f, "general error"),
            Self::ConnectionError => write!(f, "connection error"),
            Self::TargetError => write!(f, "target error"),
            Self::TimeoutError => write!(f, "timeout error"),
            Self::ProtocolError => write!(f, "protocol error"),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub code: ExitCode,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    #[must_use]
    pub fn stop_requires_session() -> Self {
        Self {
            message: "--stop requires --session <id>".into(),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn session_not_found(id: &str) -> Self {
        Self {
            message: format!("session '{id}' not found"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn invalid_url(url: &str, reason: &str) -> Self {
        Self {
            message: format!("invalid URL '{url}': {reason}"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn request_timeout(secs: u64) -> Self {
        Self {
            message: format!("request timed out after {secs}s"),
            code: ExitCode::TimeoutError,
        }
    }

    /// Prefix the message with the step that failed, keeping the exit code.
    #[must_use]
    pub fn context(self, step: impl fmt::Display) -> Self {
        Self {
            message: format!("{step}: {}", self.message),
            code: self.code,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        let output = ErrorOutput {
            error: &self.message,
            code: self.code as u8,
        };
        serde_json::to_string(&output).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","code":{}}}"#,
                self.message, self.code as u8
            )
        })
    }

    pub fn print_json_stderr(&self) {
        eprintln!("{}", self.to_json());
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self {
            message: e.to_string(),
            code: ExitCode::GeneralError,
        }
    }
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    code: u8,
}
