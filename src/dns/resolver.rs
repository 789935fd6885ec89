//! Upstream forwarding: DNS-over-HTTPS first, plain UDP as last resort.
//!
//! Each query runs an explicit ordered plan: DoH primary, DoH secondary (each
//! only if configured), then one UDP round-trip to the fixed upstream. Every
//! attempt produces `Result<Vec<u8>, ForwardError>`; the first success wins.
//! Only a failure of the final UDP attempt reaches the caller.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use crate::error::{ForwardError, ForwardResult};
use crate::store::models::{DohConfig, DohEndpoint};
use crate::store::PolicyStore;

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";
const USER_AGENT: &str = concat!("GuardianDNS/", env!("CARGO_PKG_VERSION"));
/// EDNS0 payloads go up to 4096 bytes.
const MAX_UDP_RESPONSE: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct DohAttempt {
    pub endpoint: DohEndpoint,
    pub url: Url,
    pub timeout: Duration,
}

/// Ordered upstream attempts for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    pub doh: Vec<DohAttempt>,
    /// Always present.
    pub fallback: SocketAddr,
}

impl AttemptPlan {
    pub fn new(doh: &DohConfig, fallback: SocketAddr) -> Self {
        let doh = doh
            .endpoints()
            .map(|(endpoint, url)| DohAttempt { endpoint, url: url.clone(), timeout: doh.timeout })
            .collect();
        Self { doh, fallback }
    }

    pub fn len(&self) -> usize {
        self.doh.len() + 1
    }
}

impl fmt::Display for AttemptPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attempt in &self.doh {
            write!(f, "doh-{}({}) -> ", attempt.endpoint, attempt.url)?;
        }
        write!(f, "udp({})", self.fallback)
    }
}

pub struct Forwarder {
    store: Arc<PolicyStore>,
    plain_upstream: SocketAddr,
    fallback_timeout: Duration,
    /// Created on first DoH use and reused so connections are pooled.
    client: OnceCell<reqwest::Client>,
}

impl Forwarder {
    pub fn new(store: Arc<PolicyStore>, plain_upstream: SocketAddr, fallback_timeout: Duration) -> Self {
        tracing::info!(
            "Forwarder initialized, plain upstream {} (timeout {:?})",
            plain_upstream,
            fallback_timeout
        );
        Self {
            store,
            plain_upstream,
            fallback_timeout,
            client: OnceCell::new(),
        }
    }

    /// Forward a raw wire-format query and return the raw answer.
    pub async fn resolve(&self, raw: &[u8]) -> ForwardResult<Vec<u8>> {
        let doh = self.store.load_doh_config().await;
        let plan = AttemptPlan::new(&doh, self.plain_upstream);
        tracing::trace!("Upstream plan: {}", plan);

        for attempt in &plan.doh {
            match self.query_doh(attempt, raw).await {
                Ok(response) => {
                    tracing::debug!("Answered by DoH {} endpoint", attempt.endpoint);
                    return Ok(response);
                }
                Err(e) => tracing::warn!("DoH {} attempt failed: {}", attempt.endpoint, e),
            }
        }

        match self.query_udp(plan.fallback, raw).await {
            Ok(response) => {
                tracing::debug!("Answered by plain upstream {}", plan.fallback);
                Ok(response)
            }
            Err(e) => Err(ForwardError::Exhausted { attempts: plan.len(), last: Box::new(e) }),
        }
    }

    async fn client(&self) -> ForwardResult<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(ForwardError::Client)
            })
            .await
    }

    /// Non-success status, transport error and empty body all count as failure.
    async fn query_doh(&self, attempt: &DohAttempt, raw: &[u8]) -> ForwardResult<Vec<u8>> {
        let client = self.client().await?;
        let url = attempt.url.as_str();

        let response = client
            .post(attempt.url.clone())
            .header(CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .timeout(attempt.timeout)
            .body(raw.to_vec())
            .send()
            .await
            .map_err(|source| ForwardError::Http { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::HttpStatus { url: url.to_string(), status: status.as_u16() });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ForwardError::Http { url: url.to_string(), source })?;

        if body.is_empty() {
            return Err(ForwardError::EmptyBody { url: url.to_string() });
        }

        Ok(body.to_vec())
    }

    /// One datagram out, one back, bounded by `fallback_timeout`.
    async fn query_udp(&self, addr: SocketAddr, raw: &[u8]) -> ForwardResult<Vec<u8>> {
        let io_err = |source: std::io::Error| ForwardError::Udp { addr, source };

        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await.map_err(io_err)?;
        socket.connect(addr).await.map_err(io_err)?;
        socket.send(raw).await.map_err(io_err)?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE];
        let len = tokio::time::timeout(self.fallback_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ForwardError::UdpTimeout { addr, timeout: self.fallback_timeout })?
            .map_err(io_err)?;

        buf.truncate(len);
        Ok(buf)
    }
}
