use anyhow::Result;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::net::UdpSocket;
use crate::config::Config;
use crate::metrics::DnsMetrics;
use super::handler::DnsHandler;

/// EDNS0 supports up to 4096-byte payloads.
const MAX_PACKET_SIZE: usize = 4096;
/// Log a counter summary every this many queries.
const STATS_INTERVAL: u64 = 1_000;

pub async fn run(cfg: Config, metrics: Arc<DnsMetrics>) -> Result<()> {
    let bind_addr = cfg.bind_addr();
    let handler = DnsHandler::new(&cfg, metrics)?;

    let socket = UdpSocket::bind(&bind_addr).await?;
    tracing::info!("DNS UDP listening on {}", bind_addr);

    serve(socket, handler).await
}

/// Receive loop. Queries are handled one at a time, in arrival order; the
/// next datagram is not read until the current one has been answered or
/// dropped. Never returns.
pub async fn serve(socket: UdpSocket, handler: DnsHandler) -> Result<()> {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            // ICMP port-unreachable from an earlier reply surfaces here on some platforms
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                tracing::debug!("UDP recv connection reset, ignoring");
                continue;
            }
            Err(e) => {
                tracing::warn!("UDP recv error: {}", e);
                continue;
            }
        };

        if let Some(response) = handler.handle(&buf[..len], peer.ip()).await {
            if let Err(e) = socket.send_to(&response, peer).await {
                tracing::warn!("Failed to send DNS response to {}: {}", peer, e);
            }
        }

        let metrics = handler.metrics();
        let total = metrics.total();
        if total > 0 && total % STATS_INTERVAL == 0 {
            tracing::info!("Stats: {}", metrics.summary());
        }
    }
}
