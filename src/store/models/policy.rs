use serde_json::Value;
use std::collections::{HashMap, HashSet};
use crate::dns::rules::normalize_domain;
use super::parse_object;

/// One allow/block pair, already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleLists {
    pub allow: HashSet<String>,
    pub block: HashSet<String>,
}

/// Global rules, named profiles and the legacy flat block list.
///
/// ```json
/// {
///   "domains": ["legacy-blocked.com"],
///   "global":   {"allow": ["school.org"], "block": ["ads.example.com"]},
///   "profiles": {"Kids": {"allow": [], "block": ["games.com"]}}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    pub global: RuleLists,
    pub profiles: HashMap<String, RuleLists>,
    /// Old `{"domains": [...]}` format. Always block-only.
    pub legacy_block: HashSet<String>,
}

impl RuleLists {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(section) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            allow: domain_set(section.get("allow")),
            block: domain_set(section.get("block")),
        }
    }
}

impl PolicyConfig {
    pub fn from_json(text: &str) -> Self {
        let Some(root) = parse_object(text, "policy") else {
            return Self::default();
        };

        let profiles = root
            .get("profiles")
            .and_then(Value::as_object)
            .map(|profiles| {
                profiles
                    .iter()
                    .filter(|(name, _)| !name.trim().is_empty())
                    .map(|(name, rules)| (name.trim().to_string(), RuleLists::from_value(Some(rules))))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            global: RuleLists::from_value(root.get("global")),
            profiles,
            legacy_block: domain_set(root.get("domains")),
        }
    }

    pub fn profile(&self, name: &str) -> Option<&RuleLists> {
        self.profiles.get(name)
    }
}

/// Non-string and blank entries are skipped.
fn domain_set(value: Option<&Value>) -> HashSet<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(normalize_domain)
        .filter(|d| !d.is_empty())
        .collect()
}
