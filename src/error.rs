use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed probe. Callers map it to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Tls,
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Tls => "tls",
            ErrorKind::Parse => "parse",
        };
        write!(f, "{label}")
    }
}

/// Errors that end a probe. No variant carries retry state.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Missing or malformed caller input. Only raised by the adapters.
    #[error("{0}")]
    Validation(String),

    /// The raw TCP connection could not be established.
    #[error("TCP socket error: {0}")]
    Transport(String),

    /// Handshake failure, or an I/O failure on the established secure stream.
    #[error("TLS socket error: {0}")]
    Tls(String),

    /// The response body was not a usable metadata record.
    #[error("{0}")]
    Parse(String),
}

impl ProbeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Validation(_) => ErrorKind::Validation,
            ProbeError::Transport(_) => ErrorKind::Transport,
            ProbeError::Tls(_) => ErrorKind::Tls,
            ProbeError::Parse(_) => ErrorKind::Parse,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
