use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use livetiming::credentials::CREDENTIALS_FILE;
use livetiming::frame::Catalog;
use livetiming::transport::{LIVE_PORT, LIVE_TIMING_HOST};
use tracing::info;

use crate::exit::{frame_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod catalog;
pub mod decode;
pub mod logout;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in, connect and stream until interrupted or disconnected.
    Run(RunArgs),
    /// Decode a captured stream offline.
    Decode(DecodeArgs),
    /// Print the active frame catalog.
    Catalog(CatalogArgs),
    /// Delete stored credentials.
    Logout(LogoutArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Catalog(args) => catalog::run(args, format),
        Command::Logout(args) => logout::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Timing service host (live stream and HTTP endpoints).
    #[arg(long, env = "LIVETIMING_HOST", default_value = LIVE_TIMING_HOST)]
    pub host: String,
    /// Live stream port.
    #[arg(long, env = "LIVETIMING_PORT", default_value_t = LIVE_PORT)]
    pub port: u16,
    /// Base URL of the HTTP endpoints. Default: `http://{host}`.
    #[arg(long, env = "LIVETIMING_HTTP_BASE", value_name = "URL")]
    pub http_base: Option<String>,
    /// Idle time before a poll probe is sent (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub poll_window: String,
    /// Event number to fetch the session key for before streaming.
    #[arg(long)]
    pub event: Option<String>,
    /// Frame catalog JSON document. Default: built-in catalog.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
    /// Record every frame as JSON lines to this file.
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,
    /// Notification root URL; commentary is published beneath it.
    #[arg(long, env = "LIVETIMING_FIREBASE", value_name = "URL")]
    pub firebase: Option<String>,
    /// Credential file.
    #[arg(long, env = "LIVETIMING_CREDENTIALS", default_value = CREDENTIALS_FILE)]
    pub credentials: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture of the raw live stream.
    pub capture: PathBuf,
    /// Session key (hex) used to decrypt ciphered frames.
    #[arg(long, value_name = "HEX")]
    pub key: Option<String>,
    /// Frame catalog JSON document. Default: built-in catalog.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Frame catalog JSON document to validate and print.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Credential file.
    #[arg(long, env = "LIVETIMING_CREDENTIALS", default_value = CREDENTIALS_FILE)]
    pub credentials: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// The catalog at `path`, or the built-in one.
pub(crate) fn load_catalog(path: Option<&Path>) -> CliResult<Catalog> {
    let Some(path) = path else {
        return Ok(Catalog::v1());
    };
    let catalog = Catalog::load(path).map_err(|err| frame_error(&format!("catalog {}", path.display()), err))?;
    info!(path = %path.display(), version = catalog.version(), "catalog loaded");
    Ok(catalog)
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let err = load_catalog(Some(Path::new("/nonexistent/catalog.json"))).unwrap_err();
        assert!(err.message.starts_with("catalog /nonexistent/catalog.json"));
    }
}
