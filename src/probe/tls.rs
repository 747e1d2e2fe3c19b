use crate::error::{ProbeError, Result};
use crate::model::ProbeConfig;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::debug;

/// Wraps a candidate's TCP stream in TLS while presenting the upstream
/// service's hostname, so a relay that terminates TLS for that service
/// answers as the service itself would.
#[derive(Clone)]
pub struct Negotiator {
    connector: SslConnector,
    upstream_host: String,
    skip_peer_verification: bool,
    handshake_timeout: Duration,
}

impl Negotiator {
    pub fn new(cfg: &ProbeConfig) -> Result<Self> {
        let mut builder = SslConnector::builder(SslMethod::tls())
            .map_err(|err| ProbeError::Tls(format!("failed to create TLS connector: {err}")))?;
        if cfg.skip_peer_verification {
            // Candidates are untrusted relays; any certificate is accepted.
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(Self {
            connector: builder.build(),
            upstream_host: cfg.upstream_host.clone(),
            skip_peer_verification: cfg.skip_peer_verification,
            handshake_timeout: cfg.handshake_timeout,
        })
    }

    pub async fn negotiate(&self, stream: TcpStream) -> Result<SslStream<TcpStream>> {
        let mut config = self
            .connector
            .configure()
            .map_err(|err| ProbeError::Tls(format!("failed to configure TLS connector: {err}")))?;
        if self.skip_peer_verification {
            config.set_verify_hostname(false);
        }
        let ssl = config
            .into_ssl(&self.upstream_host)
            .map_err(|err| ProbeError::Tls(format!("failed to configure TLS SNI: {err}")))?;
        let mut tls_stream = SslStream::new(ssl, stream)
            .map_err(|err| ProbeError::Tls(format!("failed to initialize TLS stream: {err}")))?;

        match timeout(self.handshake_timeout, Pin::new(&mut tls_stream).connect()).await {
            Ok(Ok(())) => {
                let ssl = tls_stream.ssl();
                debug!(
                    version = ssl.version_str(),
                    cipher = ssl.current_cipher().map(|c| c.name()).unwrap_or("unknown"),
                    "TLS handshake complete"
                );
                Ok(tls_stream)
            }
            Ok(Err(err)) => Err(ProbeError::Tls(format!(
                "handshake failed for {}: {err}",
                self.upstream_host
            ))),
            Err(_) => Err(ProbeError::Tls(format!(
                "handshake timeout after {} ms",
                self.handshake_timeout.as_millis()
            ))),
        }
    }
}
