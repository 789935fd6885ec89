use hickory_proto::rr::RecordType;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use crate::store::models::{DeviceDirectory, PolicyConfig, TimedAllowList};
use crate::store::PolicyStore;
use super::rules::{normalize_domain, RuleMatch, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
        }
    }
}

/// Why a verdict was reached. `matched` is the suffix whose rule applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    TempAllow { matched: String, expires_at: i64 },
    AllowList { matched: String },
    BlockList { matched: String },
    /// No rule applied; blocking is opt-in.
    Default,
}

impl Reason {
    pub fn tag(&self) -> &'static str {
        match self {
            Reason::TempAllow { .. } => "temp-allow",
            Reason::AllowList { .. } => "allowlist",
            Reason::BlockList { .. } => "blocklist",
            Reason::Default => "default",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::TempAllow { matched, expires_at } => {
                write!(f, "{}({} until {})", self.tag(), matched, expires_at)
            }
            Reason::AllowList { matched } | Reason::BlockList { matched } => {
                write!(f, "{}({})", self.tag(), matched)
            }
            Reason::Default => f.write_str(self.tag()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    pub reason: Reason,
    /// Profile the decision was made under, for the audit log.
    pub profile: String,
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        self.action == Action::Block
    }
}

/// Pick the profile for a client: per-IP entry, then directory default, then
/// the active-profile marker, then `fallback`.
pub fn resolve_profile(
    client_ip: IpAddr,
    directory: &DeviceDirectory,
    active_profile: Option<&str>,
    fallback: &str,
) -> String {
    directory
        .profile_for(client_ip)
        .or(directory.default_profile.as_deref())
        .or(active_profile)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Pure decision over one snapshot of every input. `domain` is normalized here.
pub fn decide(
    domain: &str,
    timed_allow: &TimedAllowList,
    policy: &PolicyConfig,
    profile: String,
) -> Verdict {
    let domain = normalize_domain(domain);

    if let Some(entry) = timed_allow.covering(&domain) {
        return Verdict {
            action: Action::Allow,
            reason: Reason::TempAllow { matched: entry.domain, expires_at: entry.expires_at },
            profile,
        };
    }

    let (action, reason) = match RuleSet::for_profile(policy, &profile).evaluate(&domain) {
        Some(RuleMatch::Allow(matched)) => (Action::Allow, Reason::AllowList { matched }),
        Some(RuleMatch::Block(matched)) => (Action::Block, Reason::BlockList { matched }),
        None => (Action::Allow, Reason::Default),
    };

    Verdict { action, reason, profile }
}

/// Classifier bound to the live Policy Store.
pub struct Classifier {
    store: Arc<PolicyStore>,
    fallback_profile: String,
}

impl Classifier {
    pub fn new(store: Arc<PolicyStore>, fallback_profile: impl Into<String>) -> Self {
        Self { store, fallback_profile: fallback_profile.into() }
    }

    pub async fn resolve_profile(&self, client_ip: IpAddr) -> String {
        let directory = self.store.load_device_directory().await;
        // The marker is only read when the directory has nothing for this client.
        if directory.profile_for(client_ip).is_some() || directory.default_profile.is_some() {
            return resolve_profile(client_ip, &directory, None, &self.fallback_profile);
        }
        let marker = self.store.load_active_profile().await;
        resolve_profile(client_ip, &directory, marker.as_deref(), &self.fallback_profile)
    }

    pub async fn classify(&self, domain: &str, qtype: RecordType, client_ip: IpAddr) -> Verdict {
        // Read fresh every time; an expired override must stop applying at once.
        let timed_allow = self.store.load_timed_allow_list().await;
        let policy = self.store.load_policy().await;
        let profile = self.resolve_profile(client_ip).await;

        let verdict = decide(domain, &timed_allow, &policy, profile);
        tracing::trace!(
            "Classified {} {} from {} as {} ({}) [{}]",
            domain,
            qtype,
            client_ip,
            verdict.action.as_str(),
            verdict.reason,
            verdict.profile,
        );
        verdict
    }
}
