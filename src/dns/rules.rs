//! Domain normalization and allow/block rule matching.
//!
//! A rule for `example.com` covers `example.com` and every name below it.
//! The name itself is checked first: an exact allow entry, then an exact block
//! entry. Otherwise its parents are walked from most to least specific,
//! stripping one leftmost label per step, and allow entries are consulted at
//! every parent level before any block entry. So with `example.com` allowed
//! and `ads.example.com` blocked, `ads.example.com` is blocked while
//! `x.ads.example.com` is allowed.

use std::collections::HashSet;
use crate::store::models::PolicyConfig;

/// Lowercase, trim whitespace, strip one trailing dot.
pub fn normalize_domain(s: &str) -> String {
    let s = s.trim().to_lowercase();
    match s.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// `a.b.c` yields `a.b.c`, `b.c`, `c`.
pub fn suffixes(domain: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(domain);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.find('.').map(|pos| &current[pos + 1..]);
        Some(current)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// Carries the suffix that matched.
    Allow(String),
    Block(String),
}

/// Effective allow/block sets for one profile.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    allowed: HashSet<String>,
    /// Never contains an entry of `allowed`.
    blocked: HashSet<String>,
}

impl RuleSet {
    /// allow = global.allow ∪ profile.allow;
    /// block = (global.block ∪ profile.block ∪ legacy) − allow.
    pub fn for_profile(policy: &PolicyConfig, profile: &str) -> Self {
        let profile_rules = policy.profile(profile);

        let allowed: HashSet<String> = policy
            .global
            .allow
            .iter()
            .chain(profile_rules.into_iter().flat_map(|p| p.allow.iter()))
            .cloned()
            .collect();

        let blocked = policy
            .global
            .block
            .iter()
            .chain(profile_rules.into_iter().flat_map(|p| p.block.iter()))
            .chain(policy.legacy_block.iter())
            .filter(|d| !allowed.contains(*d))
            .cloned()
            .collect();

        Self { allowed, blocked }
    }

    pub fn from_lists<A, B>(allow: A, block: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let allowed: HashSet<String> = allow
            .into_iter()
            .map(|d| normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        let blocked = block
            .into_iter()
            .map(|d| normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty() && !allowed.contains(d))
            .collect();
        Self { allowed, blocked }
    }

    /// `domain` must already be normalized. `None` means no rule applies.
    pub fn evaluate(&self, domain: &str) -> Option<RuleMatch> {
        if self.allowed.contains(domain) {
            return Some(RuleMatch::Allow(domain.to_string()));
        }
        if self.blocked.contains(domain) {
            return Some(RuleMatch::Block(domain.to_string()));
        }

        let parents = || suffixes(domain).skip(1);
        if let Some(suffix) = parents().find(|s| self.allowed.contains(*s)) {
            return Some(RuleMatch::Allow(suffix.to_string()));
        }
        parents()
            .find(|s| self.blocked.contains(*s))
            .map(|suffix| RuleMatch::Block(suffix.to_string()))
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn allowed_count(&self) -> usize {
        self.allowed.len()
    }
}
