use crate::error::{ErrorKind, ProbeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_HOST: &str = "speed.cloudflare.com";
pub const DEFAULT_META_PATH: &str = "/meta";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_ALIVE_LABEL: &str = "Cloudflare Proxy";
pub const UNKNOWN: &str = "Unknown";

/// A candidate relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: String,
    pub port: u16,
}

impl Target {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Option<Target>,
    pub input: Option<String>,
    pub serve: Option<SocketAddr>,
    pub probe: ProbeConfig,
    pub output: OutputConfig,
}

/// Everything a single probe needs to know about the upstream service it
/// impersonates and how long it may wait on the candidate.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Presented as SNI and sent as the `Host` header.
    pub upstream_host: String,
    pub path: String,
    pub user_agent: String,
    /// Accept any certificate the candidate presents.
    pub skip_peer_verification: bool,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Idle limit for each read on the secure stream.
    pub read_timeout: Duration,
    /// Upper bound on a whole probe, from connect to validated record.
    pub overall_timeout: Duration,
    pub max_response_bytes: usize,
    /// Prefix of the confirmation message, e.g. "Cloudflare Proxy Alive 1.2.3.4:443".
    pub alive_label: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            upstream_host: DEFAULT_UPSTREAM_HOST.into(),
            path: DEFAULT_META_PATH.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            skip_peer_verification: true,
            connect_timeout: Duration::from_millis(5000),
            handshake_timeout: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(5000),
            overall_timeout: Duration::from_millis(15000),
            max_response_bytes: 64 * 1024,
            alive_label: DEFAULT_ALIVE_LABEL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Jsonl,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Outcome of a probe that confirmed the candidate relays to the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub address: String,
    pub port: u16,
    pub is_alive: bool,
    pub as_organization: String,
    pub country_code: String,
    pub country_name: String,
    pub country_flag: String,
    pub asn: i64,
    pub colo: String,
    pub http_protocol: String,
    pub delay_ms: u64,
    pub latitude: Value,
    pub longitude: Value,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub address: String,
    pub port: u16,
    pub kind: ErrorKind,
    pub error: String,
}

impl ProbeFailure {
    pub fn new(target: &Target, err: &ProbeError) -> Self {
        Self {
            address: target.address.clone(),
            port: target.port,
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// One line of CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRecord {
    pub timestamp: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Alive(ProbeResult),
    Failed(ProbeFailure),
}

impl ProbeRecord {
    pub fn from_result(target: &Target, result: crate::error::Result<ProbeResult>) -> Self {
        let outcome = match result {
            Ok(result) => ProbeOutcome::Alive(result),
            Err(err) => ProbeOutcome::Failed(ProbeFailure::new(target, &err)),
        };
        Self {
            timestamp: crate::util::now_iso8601(),
            outcome,
        }
    }
}
