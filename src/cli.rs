use crate::model::{
    Config, OutputConfig, OutputFormat, ProbeConfig, Target, DEFAULT_ALIVE_LABEL,
    DEFAULT_META_PATH, DEFAULT_UPSTREAM_HOST, DEFAULT_USER_AGENT,
};
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Checks whether a host:port relays TLS traffic to an upstream service",
    long_about = None
)]
pub struct Cli {
    /// Candidate address to probe
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Candidate port to probe
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// File containing candidates (one host:port per line)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<String>,

    /// Serve the probe as an HTTP API on this address instead of probing once
    #[arg(long = "serve", value_name = "ADDR")]
    pub serve: Option<SocketAddr>,

    /// Hostname presented as SNI and Host header
    #[arg(long = "upstream-host", default_value = DEFAULT_UPSTREAM_HOST)]
    pub upstream_host: String,

    /// Path of the upstream metadata endpoint
    #[arg(long = "path", default_value = DEFAULT_META_PATH)]
    pub path: String,

    /// User-Agent header sent with the probe request
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Label used in the confirmation message of a live candidate
    #[arg(long = "label", default_value = DEFAULT_ALIVE_LABEL)]
    pub label: String,

    /// Verify the candidate's certificate against the system trust store
    #[arg(long = "verify-peer", action = ArgAction::SetTrue)]
    pub verify_peer: bool,

    /// Connect timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// TLS handshake timeout in milliseconds
    #[arg(long = "handshake-timeout", default_value_t = 5000)]
    pub handshake_timeout_ms: u64,

    /// Idle read timeout in milliseconds
    #[arg(long = "read-timeout", default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Limit for a whole probe in milliseconds
    #[arg(long = "overall-timeout", default_value_t = 15000)]
    pub overall_timeout_ms: u64,

    /// Max bytes to accept from a candidate's response
    #[arg(long = "max-bytes", default_value_t = 64 * 1024)]
    pub max_bytes: usize,

    /// Output format
    #[arg(long = "output", default_value_t = OutputFormat::Jsonl)]
    pub output: OutputFormat,

    /// Human readable output instead of JSONL
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pub pretty: bool,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<Config> {
        let sources = [self.host.is_some(), self.input.is_some(), self.serve.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if sources == 0 {
            anyhow::bail!("one of --host/--port, --input or --serve is required");
        }
        if sources > 1 {
            anyhow::bail!("--host/--port, --input and --serve are mutually exclusive");
        }

        if self.connect_timeout_ms == 0
            || self.handshake_timeout_ms == 0
            || self.read_timeout_ms == 0
            || self.overall_timeout_ms == 0
        {
            anyhow::bail!("timeouts must be greater than zero");
        }

        if self.upstream_host.trim().is_empty() {
            anyhow::bail!("--upstream-host must not be empty");
        }

        let target = match (self.host, self.port) {
            (Some(_), Some(0)) => anyhow::bail!("--port must be between 1 and 65535"),
            (Some(h), _) if h.trim().is_empty() => anyhow::bail!("--host must not be empty"),
            (Some(h), Some(p)) => Some(Target::new(h.trim(), p)),
            (None, None) => None,
            _ => anyhow::bail!("--host and --port must be used together"),
        };

        Ok(Config {
            target,
            input: self.input,
            serve: self.serve,
            probe: ProbeConfig {
                upstream_host: self.upstream_host,
                path: self.path,
                user_agent: self.user_agent,
                skip_peer_verification: !self.verify_peer,
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
                read_timeout: Duration::from_millis(self.read_timeout_ms),
                overall_timeout: Duration::from_millis(self.overall_timeout_ms),
                max_response_bytes: self.max_bytes.max(1),
                alive_label: self.label,
            },
            output: OutputConfig {
                format: if self.pretty {
                    OutputFormat::Pretty
                } else {
                    self.output
                },
            },
        })
    }
}
