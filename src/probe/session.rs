use super::{http, meta, RelayProbe};
use crate::engine::connector;
use crate::engine::reader::ResponseReader;
use crate::error::{ErrorKind, ProbeError, Result};
use crate::model::{ProbeResult, Target};
use crate::util::duration_millis;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{timeout, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Sending,
    Receiving,
    Parsing,
    Done,
    Failed(ErrorKind),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Handshaking => write!(f, "handshaking"),
            SessionState::Sending => write!(f, "sending"),
            SessionState::Receiving => write!(f, "receiving"),
            SessionState::Parsing => write!(f, "parsing"),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// One probe of one candidate. Consumed by [`ProbeSession::run`], so a
/// session can never be restarted.
pub struct ProbeSession<'a> {
    probe: &'a RelayProbe,
    target: &'a Target,
    state: SessionState,
}

impl<'a> ProbeSession<'a> {
    pub fn new(probe: &'a RelayProbe, target: &'a Target) -> Self {
        Self {
            probe,
            target,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the session to `Done` or `Failed` within `overall_timeout`,
    /// however slowly the peer keeps bytes coming.
    pub async fn run(mut self) -> Result<ProbeResult> {
        let overall = self.probe.cfg.overall_timeout;
        let outcome = match timeout(overall, self.drive()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.expired(overall)),
        };
        match outcome {
            Ok(result) => {
                self.enter(SessionState::Done);
                Ok(result)
            }
            Err(err) => {
                self.enter(SessionState::Failed(err.kind()));
                Err(err)
            }
        }
    }

    // Both streams are owned locals here, so every return path closes them.
    async fn drive(&mut self) -> Result<ProbeResult> {
        let probe = self.probe;
        let target = self.target;
        let cfg = &probe.cfg;
        let started = Instant::now();

        let stream = connector::connect(target, cfg.connect_timeout).await?;
        self.enter(SessionState::Handshaking);
        let mut tls_stream = probe.negotiator.negotiate(stream).await?;

        self.enter(SessionState::Sending);
        let request = http::build_request(cfg);
        tls_stream
            .write_all(request.as_bytes())
            .await
            .map_err(|err| ProbeError::Tls(format!("failed to write request: {err}")))?;
        tls_stream
            .flush()
            .await
            .map_err(|err| ProbeError::Tls(format!("failed to write request: {err}")))?;

        self.enter(SessionState::Receiving);
        let mut reader = ResponseReader::new(cfg.max_response_bytes, cfg.read_timeout);
        let read = reader.read(&mut tls_stream).await?;
        drop(tls_stream);
        debug!(
            bytes = read.bytes.len(),
            truncated = read.truncated,
            "response received"
        );

        self.enter(SessionState::Parsing);
        let text = String::from_utf8_lossy(&read.bytes);
        let (head, body) = http::split_head_body(&text)
            .ok_or_else(|| ProbeError::Parse("Failed to parse JSON from proxy".into()))?;
        debug!(status = http::status_line(head), "parsing metadata body");
        let record = meta::parse_metadata(body)?;
        let delay = started.elapsed();
        debug!(
            client_ip = record.client_ip().as_deref().unwrap_or_default(),
            delay_ms = duration_millis(delay),
            "metadata validated"
        );

        Ok(record.into_result(
            target,
            delay,
            probe.regions.as_ref(),
            &cfg.alive_label,
        ))
    }

    // Still connecting means the TCP stage never finished; anything later
    // happened on the secure channel.
    fn expired(&self, overall: Duration) -> ProbeError {
        let message = format!(
            "overall timeout after {} ms while {}",
            duration_millis(overall),
            self.state()
        );
        match self.state() {
            SessionState::Connecting => ProbeError::Transport(message),
            _ => ProbeError::Tls(message),
        }
    }

    fn enter(&mut self, next: SessionState) {
        trace!(from = %self.state, to = %next, "probe state");
        self.state = next;
    }
}
