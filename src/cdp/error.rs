use std::fmt;

/// Failures on the DevTools control channel.
#[derive(Debug)]
pub enum CdpError {
    /// The WebSocket handshake failed.
    Connection(String),

    ConnectionTimeout,

    /// No reply arrived before the command deadline.
    CommandTimeout { method: String },

    /// The browser answered with an error object.
    Protocol { code: i64, message: String },

    /// The socket closed while a command was in flight or after shutdown.
    ConnectionClosed,

    /// A reply was missing a field the caller depends on.
    InvalidResponse(String),

    /// The transport task is gone.
    Internal(String),
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "CDP connection error: {msg}"),
            Self::ConnectionTimeout => write!(f, "CDP connection timed out"),
            Self::CommandTimeout { method } => write!(f, "CDP command timed out: {method}"),
            Self::Protocol { code, message } => {
                write!(f, "CDP protocol error ({code}): {message}")
            }
            Self::ConnectionClosed => write!(f, "CDP connection closed"),
            Self::InvalidResponse(msg) => write!(f, "CDP invalid response: {msg}"),
            Self::Internal(msg) => write!(f, "CDP internal error: {msg}"),
        }
    }
}

impl std::error::Error for CdpError {}

impl From<CdpError> for crate::error::AppError {
    fn from(e: CdpError) -> Self {
        use crate::error::ExitCode;
        let code = match &e {
            CdpError::Connection(_) | CdpError::ConnectionClosed => ExitCode::ConnectionError,
            CdpError::ConnectionTimeout | CdpError::CommandTimeout { .. } => ExitCode::TimeoutError,
            CdpError::Protocol { .. } => ExitCode::ProtocolError,
            CdpError::InvalidResponse(_) | CdpError::Internal(_) => ExitCode::GeneralError,
        };
        Self {
            message: e.to_string(),
            code,
        }
    }
}
