use livetiming_frame::FrameError;
use livetiming_transport::TransportError;

/// Errors that can end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login failed or returned no session token.
    #[error("authentication failed: {0}")]
    Auth(#[source] TransportError),

    /// An HTTP collaborator or the live connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A ciphered stream needs a key, but no event number is known to fetch it.
    #[error("no session key available: {0}")]
    KeyUnavailable(String),

    /// The live connection went away.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// I/O error on the live connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background worker panicked or could not be started.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl SessionError {
    /// Classify a collaborator error, keeping authentication failures distinct.
    pub fn from_login(err: TransportError) -> Self {
        if err.is_auth_failure() {
            SessionError::Auth(err)
        } else {
            SessionError::Transport(err)
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
