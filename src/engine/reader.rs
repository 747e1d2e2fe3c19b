use crate::error::{ProbeError, Result};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

const CHUNK_SIZE: usize = 8 * 1024;

/// Accumulates a response until the peer closes the stream.
///
/// End of stream is the only completion signal: no `Content-Length` or
/// chunked framing is interpreted. Reads are bounded by an idle timeout and
/// the buffer by `max_bytes`.
pub struct ResponseReader {
    max_bytes: usize,
    idle_timeout: Duration,
}

impl ResponseReader {
    pub fn new(max_bytes: usize, idle_timeout: Duration) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
            idle_timeout,
        }
    }

    pub async fn read<T: AsyncRead + Unpin>(&mut self, stream: &mut T) -> Result<ReadResult> {
        let mut bytes = Vec::with_capacity(CHUNK_SIZE.min(self.max_bytes));
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut reason = ReadStopReason::ConnectionClosed;

        loop {
            let room = (self.max_bytes - bytes.len()).min(CHUNK_SIZE);
            let n = match timeout(self.idle_timeout, stream.read(&mut chunk[..room])).await {
                Ok(Ok(n)) => n,
                Ok(Err(err)) if !bytes.is_empty() && is_truncated_close(&err) => 0,
                Ok(Err(err)) => return Err(ProbeError::Tls(err.to_string())),
                Err(_) => {
                    return Err(ProbeError::Tls(format!(
                        "read timeout after {} ms with {} bytes received",
                        self.idle_timeout.as_millis(),
                        bytes.len()
                    )))
                }
            };
            if n == 0 && bytes.is_empty() {
                return Err(ProbeError::Tls(
                    "connection closed before any response data".into(),
                ));
            }
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if bytes.len() >= self.max_bytes {
                reason = ReadStopReason::SizeLimit;
                break;
            }
        }

        Ok(ReadResult {
            truncated: reason == ReadStopReason::SizeLimit,
            bytes,
            reason,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub bytes: Vec<u8>,
    pub reason: ReadStopReason,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStopReason {
    ConnectionClosed,
    SizeLimit,
}

// Many relays drop TCP right after the response without sending a TLS
// close_notify. OpenSSL reports that as an error rather than a clean EOF.
fn is_truncated_close(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::UnexpectedEof
        || err.to_string().to_ascii_lowercase().contains("unexpected eof")
}
