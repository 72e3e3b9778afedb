use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Open the persistent live connection to `host:port`.
///
/// The stream carries application-framed bytes only; there is no
/// transport-level length prefix, so callers frame it themselves.
pub async fn connect_live(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    debug!(%addr, "started connecting");
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
    stream.set_nodelay(true)?;
    info!(peer = ?stream.peer_addr().ok(), "connected to live stream");
    Ok(stream)
}
