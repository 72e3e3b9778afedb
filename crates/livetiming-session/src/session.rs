use livetiming_frame::{Cipher, SessionKey};
use livetiming_transport::{AuthToken, TimingService};
use tracing::{debug, info};

use crate::error::{Result, SessionError};

/// Per-connection session state.
///
/// Created by a successful login and owned by exactly one connection. The
/// cipher lives here rather than anywhere shared, so a new session always
/// starts from a freshly seeded register.
#[derive(Debug)]
pub struct Session {
    token: AuthToken,
    event_number: Option<String>,
    cipher: Option<Cipher>,
}

impl Session {
    /// Session for an already issued token.
    pub fn new(token: AuthToken) -> Self {
        Self {
            token,
            event_number: None,
            cipher: None,
        }
    }

    /// Log in through `service` and start a session.
    ///
    /// Rejected credentials surface as [`SessionError::Auth`]; anything else
    /// as [`SessionError::Transport`].
    pub fn login<S>(service: &S, email: &str, password: &str) -> Result<Self>
    where
        S: TimingService + ?Sized,
    {
        let token = service
            .login(email, password)
            .map_err(SessionError::from_login)?;
        info!("logged in");
        Ok(Self::new(token))
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Event the session key belongs to, once installed.
    pub fn event_number(&self) -> Option<&str> {
        self.event_number.as_deref()
    }

    pub fn has_key(&self) -> bool {
        self.cipher.is_some()
    }

    /// Install the session key and seed the cipher.
    ///
    /// The key is set once; later calls are ignored and return `false`.
    pub fn install_key(&mut self, event: &str, key: SessionKey) -> bool {
        if self.cipher.is_some() {
            debug!(event, "session key already installed, ignoring");
            return false;
        }
        self.event_number = Some(event.to_string());
        self.cipher = Some(Cipher::new(key));
        info!(event, "session key installed");
        true
    }

    /// The one cipher of the session, threaded through every live and
    /// replayed decrypt in processing order.
    pub fn cipher_mut(&mut self) -> Option<&mut Cipher> {
        self.cipher.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use livetiming_frame::CIPHER_SEED;
    use livetiming_transport::TransportError;

    use super::*;

    struct Login(Option<u16>);

    impl TimingService for Login {
        fn login(&self, _email: &str, _password: &str) -> livetiming_transport::Result<AuthToken> {
            match self.0 {
                None => Ok(AuthToken::new("tok")),
                Some(401) => Err(TransportError::LoginRejected { status: 200 }),
                Some(status) => Err(TransportError::Status {
                    url: "http://test/reg/login".to_string(),
                    status,
                }),
            }
        }

        fn fetch_session_key(&self, _event: &str, _token: &AuthToken) -> livetiming_transport::Result<u32> {
            Ok(1)
        }

        fn fetch_snapshot(&self, _snapshot_id: u16) -> livetiming_transport::Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[test]
    fn login_creates_session_without_key() {
        let session = Session::login(&Login(None), "a", "b").unwrap();
        assert_eq!(session.token().expose(), "tok");
        assert!(!session.has_key());
        assert!(session.event_number().is_none());
    }

    #[test]
    fn rejected_login_is_auth_error() {
        let err = Session::login(&Login(Some(401)), "a", "b").unwrap_err();
        assert!(err.is_auth_failure());

        let err = Session::login(&Login(Some(500)), "a", "b").unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn key_is_installed_once_with_seeded_register() {
        let mut session = Session::new(AuthToken::new("tok"));
        assert!(session.install_key("6001", SessionKey::new(0xabcd)));
        assert!(!session.install_key("6002", SessionKey::new(0x1234)));

        assert_eq!(session.event_number(), Some("6001"));
        assert_eq!(session.cipher_mut().map(|c| c.register()), Some(CIPHER_SEED));

        // The installed cipher decrypts with the first key.
        let mut expected = Cipher::new(SessionKey::new(0xabcd));
        let plain = session.cipher_mut().map(|c| c.decrypt(b"\x10\x20"));
        assert_eq!(plain, Some(expected.decrypt(b"\x10\x20")));
    }
}
