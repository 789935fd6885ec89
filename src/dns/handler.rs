use anyhow::Result;
use hickory_proto::op::{Message, MessageType, OpCode};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use crate::config::Config;
use crate::error::QueryError;
use crate::metrics::DnsMetrics;
use crate::store::PolicyStore;
use super::filter::{Action, Classifier, Reason, Verdict};
use super::resolver::Forwarder;
use super::sinkhole::build_sinkhole_response;

/// Parse raw bytes into a standard query with at least one question.
pub fn parse_query(raw: &[u8]) -> Result<Message, QueryError> {
    let request = Message::from_vec(raw)?;
    if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
        return Err(QueryError::NotAQuery);
    }
    if request.queries().is_empty() {
        return Err(QueryError::NoQuestion);
    }
    Ok(request)
}

pub struct DnsHandler {
    classifier: Classifier,
    forwarder: Forwarder,
    sinkhole_ip: Ipv4Addr,
    metrics: Arc<DnsMetrics>,
}

impl DnsHandler {
    pub fn new(cfg: &Config, metrics: Arc<DnsMetrics>) -> Result<Self> {
        let store = Arc::new(PolicyStore::new(&cfg.documents));
        let classifier = Classifier::new(store.clone(), cfg.profiles.fallback.clone());
        let forwarder = Forwarder::new(store, cfg.upstream.plain_addr()?, cfg.upstream.fallback_timeout());
        Ok(Self::from_parts(classifier, forwarder, cfg.dns.sinkhole_ip, metrics))
    }

    pub fn from_parts(
        classifier: Classifier,
        forwarder: Forwarder,
        sinkhole_ip: Ipv4Addr,
        metrics: Arc<DnsMetrics>,
    ) -> Self {
        Self { classifier, forwarder, sinkhole_ip, metrics }
    }

    pub fn metrics(&self) -> &Arc<DnsMetrics> {
        &self.metrics
    }

    /// Answer one datagram. Never fails: if the pipeline errors, the raw bytes
    /// are forwarded upstream unfiltered, and only if that also fails is the
    /// query dropped (`None`).
    pub async fn handle(&self, raw: &[u8], client_ip: IpAddr) -> Option<Vec<u8>> {
        let err = match self.process(raw, client_ip).await {
            Ok(response) => return Some(response),
            Err(e) => e,
        };

        tracing::error!(client = %client_ip, error = %err, "query failed, forwarding unfiltered");
        match self.forwarder.resolve(raw).await {
            Ok(response) => {
                self.metrics.inc_fail_open();
                tracing::warn!(client = %client_ip, decision = "fail-open", "answered unfiltered");
                Some(response)
            }
            Err(e) => {
                self.metrics.inc_dropped();
                tracing::error!(client = %client_ip, error = %e, "fail-open forward failed, dropping query");
                None
            }
        }
    }

    async fn process(&self, raw: &[u8], client_ip: IpAddr) -> Result<Vec<u8>> {
        let request = parse_query(raw)?;
        let query = &request.queries()[0];
        let domain = query.name().to_string();
        let qtype = query.query_type();

        let verdict = self.classifier.classify(&domain, qtype, client_ip).await;
        log_decision(&verdict, &domain, &qtype.to_string(), client_ip);

        match verdict.action {
            Action::Block => {
                let response = build_sinkhole_response(&request, self.sinkhole_ip)?;
                self.metrics.inc_blocked();
                Ok(response)
            }
            Action::Allow => {
                let response = self.forwarder.resolve(raw).await?;
                if matches!(verdict.reason, Reason::TempAllow { .. }) {
                    self.metrics.inc_temp_allowed();
                } else {
                    self.metrics.inc_allowed();
                }
                Ok(response)
            }
        }
    }
}

/// One audit line per decision.
fn log_decision(verdict: &Verdict, domain: &str, qtype: &str, client_ip: IpAddr) {
    let domain = domain.trim_end_matches('.');
    tracing::info!(
        decision = verdict.action.as_str(),
        reason = %verdict.reason,
        domain = %domain,
        qtype = %qtype,
        profile = %verdict.profile,
        client = %client_ip,
        "[{}] {} ({}) [{}]",
        verdict.reason.tag().to_uppercase(),
        domain,
        qtype,
        verdict.profile,
    );
}
