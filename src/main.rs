use clap::Parser;
use relay_probe::cli::Cli;
use relay_probe::engine::Engine;
use relay_probe::output::OutputChannel;
use relay_probe::probe::{Prober, RelayProbe};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = cli.into_config()?;

    let prober: Arc<dyn Prober> = Arc::new(RelayProbe::new(cfg.probe.clone())?);
    if let Some(addr) = cfg.serve {
        return relay_probe::server::serve(addr, prober).await;
    }

    let sink = OutputChannel::new(cfg.output.clone())?;
    let mut engine = Engine::new(cfg, prober, sink);
    engine.run().await?;

    Ok(())
}
