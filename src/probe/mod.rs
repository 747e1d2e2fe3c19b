mod http;
mod meta;
mod session;
mod tls;

pub use meta::{parse_metadata, MetaRecord};
pub use session::{ProbeSession, SessionState};
pub use tls::Negotiator;

use crate::error::Result;
use crate::model::{ProbeConfig, ProbeResult, Target};
use crate::region::{IsoRegionNames, RegionNames};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Checks a single candidate. Implementations hold no per-probe state, so one
/// instance may serve many independent probes.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> Result<ProbeResult>;
}

/// Connects to the candidate, speaks TLS as the upstream host and asks for
/// the upstream's metadata document.
pub struct RelayProbe {
    cfg: ProbeConfig,
    negotiator: Negotiator,
    regions: Arc<dyn RegionNames>,
}

impl RelayProbe {
    pub fn new(cfg: ProbeConfig) -> Result<Self> {
        Self::with_regions(cfg, Arc::new(IsoRegionNames))
    }

    pub fn with_regions(cfg: ProbeConfig, regions: Arc<dyn RegionNames>) -> Result<Self> {
        Ok(Self {
            negotiator: Negotiator::new(&cfg)?,
            cfg,
            regions,
        })
    }
}

#[async_trait]
impl Prober for RelayProbe {
    #[instrument(skip(self, target), fields(candidate = %target, upstream = %self.cfg.upstream_host))]
    async fn probe(&self, target: &Target) -> Result<ProbeResult> {
        let result = ProbeSession::new(self, target).run().await;
        match &result {
            Ok(res) => debug!(delay_ms = res.delay_ms, colo = %res.colo, "candidate relays upstream"),
            Err(err) => debug!(kind = %err.kind(), error = %err, "probe failed"),
        }
        result
    }
}
