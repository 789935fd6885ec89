use anyhow::Result;
use std::sync::Arc;
use crate::config::Config;
use crate::metrics::DnsMetrics;

pub mod server;
pub mod handler;
pub mod resolver;
pub mod filter;
pub mod rules;
pub mod sinkhole;

pub use filter::{Action, Classifier, Reason, Verdict};
pub use handler::DnsHandler;
pub use resolver::Forwarder;

pub async fn serve(cfg: Config, metrics: Arc<DnsMetrics>) -> Result<()> {
    tracing::info!("DNS server starting on {}:{}", cfg.dns.bind, cfg.dns.port);
    server::run(cfg, metrics).await
}
