pub mod connector;
pub mod reader;

use crate::model::{Config, ProbeOutcome, ProbeRecord};
use crate::output::OutputChannel;
use crate::probe::Prober;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, instrument, warn};

/// Probes every configured target one after another and emits a record per
/// target.
pub struct Engine {
    cfg: Config,
    prober: Arc<dyn Prober>,
    sink: OutputChannel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub probed: usize,
    pub alive: usize,
}

impl Engine {
    pub fn new(cfg: Config, prober: Arc<dyn Prober>, sink: OutputChannel) -> Self {
        Self { cfg, prober, sink }
    }

    #[instrument(skip(self))]
    pub async fn run(&mut self) -> anyhow::Result<RunSummary> {
        let mut targets = crate::input::stream_targets(&self.cfg)?;
        let mut summary = RunSummary::default();

        while let Some(target) = targets.next().await {
            let result = self.prober.probe(&target).await;
            if let Err(err) = &result {
                warn!(candidate = %target, kind = %err.kind(), error = %err, "candidate rejected");
            }
            let record = ProbeRecord::from_result(&target, result);
            summary.probed += 1;
            if matches!(record.outcome, ProbeOutcome::Alive(_)) {
                summary.alive += 1;
            }
            self.sink.emit(record).await?;
        }

        self.sink.shutdown().await?;
        info!(probed = summary.probed, alive = summary.alive, "probe run finished");
        Ok(summary)
    }
}
