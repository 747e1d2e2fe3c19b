use crate::error::{ProbeError, Result};
use crate::model::Target;
use std::io;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// Opens the raw TCP stream to a candidate. One attempt, bounded by
/// `connect_timeout`; resolution and every resolved address share that budget.
pub async fn connect(target: &Target, connect_timeout: Duration) -> Result<TcpStream> {
    match timeout(connect_timeout, resolve_and_connect(target)).await {
        Ok(Ok(stream)) => {
            if let Err(err) = stream.set_nodelay(true) {
                debug!(error = %err, "failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(err)) => Err(ProbeError::Transport(err.to_string())),
        Err(_) => Err(ProbeError::Transport(format!(
            "connect timeout after {} ms",
            connect_timeout.as_millis()
        ))),
    }
}

async fn resolve_and_connect(target: &Target) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in lookup_host((target.address.as_str(), target.port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} resolved to no addresses", target.address),
        )
    }))
}
