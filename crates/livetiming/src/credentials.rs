//! The `.f1rc` credential file.
//!
//! A plain `key=value` file holding `email=` and `password=` lines. It is read
//! once at startup; when it is missing or incomplete the user is prompted and
//! the answers are stored. A rejected login removes the file so the next run
//! prompts again.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Default credential file name, resolved against the working directory.
pub const CREDENTIALS_FILE: &str = ".f1rc";

/// Login credentials for the timing service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Credentials {
    /// Parse `key=value` lines. Unknown keys, comments and blank lines are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let mut email = None;
        let mut password = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "email" if !value.is_empty() => email = Some(value.to_string()),
                "password" if !value.is_empty() => password = Some(value.to_string()),
                _ => {}
            }
        }
        Some(Self {
            email: email?,
            password: password?,
        })
    }

    fn render(&self) -> String {
        format!("email={}\npassword={}\n", self.email, self.password)
    }
}

/// Location of the stored credentials.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(CREDENTIALS_FILE)
    }
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when the file is missing or incomplete.
    pub fn load(&self) -> io::Result<Option<Credentials>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let credentials = Credentials::parse(&text);
        if credentials.is_none() {
            warn!(path = %self.path.display(), "credential file is incomplete, asking again");
        }
        Ok(credentials)
    }

    /// Write `credentials`, readable by the owner only where supported.
    pub fn store(&self, credentials: &Credentials) -> io::Result<()> {
        fs::write(&self.path, credentials.render())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), "credentials stored");
        Ok(())
    }

    /// Delete the stored credentials. Returns `false` when there were none.
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Stored credentials, prompting on `input`/`output` and storing the
    /// answers when none are stored yet.
    pub fn obtain<R: BufRead, W: Write>(&self, input: R, output: W) -> io::Result<Credentials> {
        if let Some(credentials) = self.load()? {
            return Ok(credentials);
        }
        let credentials = prompt(input, output)?;
        self.store(&credentials)?;
        Ok(credentials)
    }
}

/// Ask for an email address and password until both are non-empty.
pub fn prompt<R: BufRead, W: Write>(mut input: R, mut output: W) -> io::Result<Credentials> {
    writeln!(output, "Please enter your live-timing account details.")?;
    let email = ask(&mut input, &mut output, "Email: ")?;
    let password = ask(&mut input, &mut output, "Password: ")?;
    Ok(Credentials { email, password })
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> io::Result<String> {
    loop {
        write!(output, "{label}")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before credentials were entered",
            ));
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}
