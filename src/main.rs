use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use guardian_dns::{config, dns, metrics};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::read()?;
    init_tracing(&cfg)?;
    config::validate(&cfg)?;

    info!("Starting GuardianDNS v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Documents in {}, fallback profile {}",
        cfg.documents.dir.display(),
        cfg.profiles.fallback
    );

    let metrics = Arc::new(metrics::DnsMetrics::default());

    dns::serve(cfg, metrics).await
}

/// Decision lines go to stdout, or appended to `log.file` when set.
fn init_tracing(cfg: &config::Config) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("guardian_dns=info".parse()?);

    match &cfg.log.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}
