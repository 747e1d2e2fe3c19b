use crate::model::{Config, Target};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub fn stream_targets(cfg: &Config) -> anyhow::Result<ReceiverStream<Target>> {
    let (tx, rx) = mpsc::channel(256);

    if let Some(target) = cfg.target.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            tx.send(target).await.ok();
        });
    }

    if let Some(path) = cfg.input.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(err) = read_file(path, tx).await {
                tracing::error!(error = %err, "failed to read input file");
            }
        });
    }

    drop(tx);
    Ok(ReceiverStream::new(rx))
}

async fn read_file(path: String, tx: mpsc::Sender<Target>) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("cannot open input {}", path))?;
    let mut reader = BufReader::new(file).lines();
    while let Some(line) = reader.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(target) = parse_target(trimmed) {
            if tx.send(target).await.is_err() {
                break;
            }
        } else {
            tracing::warn!(line = %trimmed, "skipping invalid target");
        }
    }
    Ok(())
}

/// Accepts `host:port`, `[v6]:port` and the `host,port` form common in
/// published relay lists.
pub fn parse_target(line: &str) -> Option<Target> {
    let (host_part, port_part) = line.rsplit_once(',').or_else(|| line.rsplit_once(':'))?;
    let host = host_part
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port: u16 = port_part.trim().parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(Target::new(host, port))
}
