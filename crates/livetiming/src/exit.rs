use std::fmt;
use std::io;

use livetiming::frame::FrameError;
use livetiming::session::SessionError;
use livetiming::transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const AUTH_FAILED: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { .. } | TransportError::Request { .. } | TransportError::Status { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        err if err.is_auth_failure() => CliError::new(AUTH_FAILED, format!("{context}: {err}")),
        TransportError::InvalidKey { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Json(_)
        | FrameError::DuplicateEntry { .. }
        | FrameError::KindOutOfRange { .. }
        | FrameError::Truncated { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Auth(source) => CliError::new(AUTH_FAILED, format!("{context}: {source}")),
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::KeyUnavailable(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SessionError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Io(source) => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_auth_code() {
        let err = SessionError::from_login(TransportError::LoginRejected { status: 200 });
        assert_eq!(session_error("login", err).code, AUTH_FAILED);
    }

    #[test]
    fn transport_faults_map_to_transport_code() {
        let err = SessionError::from_login(TransportError::Request {
            url: "http://x/reg/login".to_string(),
            message: "dns".to_string(),
        });
        assert_eq!(session_error("login", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn disconnect_is_a_plain_failure() {
        let err = SessionError::Disconnected("server closed".to_string());
        let mapped = session_error("stream", err);
        assert_eq!(mapped.code, FAILURE);
        assert!(mapped.message.starts_with("stream: "));
    }

    #[test]
    fn truncated_capture_is_invalid_data() {
        assert_eq!(frame_error("decode", FrameError::Truncated { pending: 3 }).code, DATA_INVALID);
    }
}
