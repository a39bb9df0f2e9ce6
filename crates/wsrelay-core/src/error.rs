//! Shared error type across wsRelay crates.

use thiserror::Error;

/// How the session loop reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Log and keep the loop running (bad frame, read timeout).
    Recoverable,
    /// A handler failed; the request is dropped, the session lives on.
    Handler,
    /// The session cannot continue; close the connection.
    Fatal,
}

/// Stable error codes carried in explicit error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed frame or envelope.
    Decode,
    /// Invalid request parameters.
    BadRequest,
    /// No handler is registered for the action.
    UnknownAction,
    /// Backend service failed.
    Backend,
    /// Transport is closed or broken.
    Transport,
    /// Operation timed out.
    Timeout,
    /// Configuration rejected.
    Config,
    /// Unsupported protocol/config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Decode => "DECODE",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnknownAction => "UNKNOWN_ACTION",
            ErrorCode::Backend => "BACKEND",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("read timed out")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("transport: {0}")]
    Transport(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("backend: {0}")]
    Backend(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("heartbeat {0} was never acknowledged")]
    HeartbeatMissed(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map an error onto the session loop's continue/drop/close policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            RelayError::Decode(_) | RelayError::Timeout => ErrorClass::Recoverable,
            RelayError::Backend(_)
            | RelayError::UnknownAction(_)
            | RelayError::BadRequest(_) => ErrorClass::Handler,
            RelayError::Closed
            | RelayError::Transport(_)
            | RelayError::Send(_)
            | RelayError::HeartbeatMissed(_)
            | RelayError::Config(_)
            | RelayError::UnsupportedVersion
            | RelayError::Internal(_) => ErrorClass::Fatal,
        }
    }

    /// Map internal error to a stable wire code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Decode(_) => ErrorCode::Decode,
            RelayError::Timeout | RelayError::HeartbeatMissed(_) => ErrorCode::Timeout,
            RelayError::Closed | RelayError::Transport(_) | RelayError::Send(_) => {
                ErrorCode::Transport
            }
            RelayError::Backend(_) => ErrorCode::Backend,
            RelayError::UnknownAction(_) => ErrorCode::UnknownAction,
            RelayError::BadRequest(_) => ErrorCode::BadRequest,
            RelayError::Config(_) => ErrorCode::Config,
            RelayError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            RelayError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
