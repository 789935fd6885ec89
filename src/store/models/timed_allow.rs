use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use crate::dns::rules::{normalize_domain, suffixes};
use super::parse_object;

/// A temporary override: `domain` (and its subdomains) is allowed until
/// `expires_at` (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedAllowEntry {
    pub domain: String,
    pub expires_at: i64,
}

/// Unexpired temporary-allow entries, keyed by normalized domain.
///
/// ```json
/// {"items": [
///   {"domain": "homework.example", "expires_at": "2024-05-01T18:00:00Z"},
///   {"domain": "video.example",    "expires_at": 1714586400}
/// ]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimedAllowList {
    entries: HashMap<String, i64>,
}

impl TimedAllowList {
    /// Entries with `expires_at <= now` are dropped here, at read time.
    pub fn from_json(text: &str, now: DateTime<Utc>) -> Self {
        let Some(root) = parse_object(text, "timed-allow") else {
            return Self::default();
        };
        let now = now.timestamp();

        let mut entries: HashMap<String, i64> = HashMap::new();
        for item in root.get("items").and_then(Value::as_array).into_iter().flatten() {
            let Some(entry) = parse_entry(item) else {
                tracing::debug!("Skipping malformed timed-allow entry: {}", item);
                continue;
            };
            if entry.expires_at <= now {
                continue;
            }
            let expiry = entries.entry(entry.domain).or_insert(entry.expires_at);
            *expiry = (*expiry).max(entry.expires_at);
        }

        Self { entries }
    }

    /// First entry covering `domain`, searching from the domain itself up
    /// through its parents.
    pub fn covering(&self, domain: &str) -> Option<TimedAllowEntry> {
        suffixes(domain).find_map(|suffix| {
            self.entries.get(suffix).map(|&expires_at| TimedAllowEntry {
                domain: suffix.to_string(),
                expires_at,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(item: &Value) -> Option<TimedAllowEntry> {
    let domain = normalize_domain(item.get("domain")?.as_str()?);
    if domain.is_empty() {
        return None;
    }
    let expires_at = parse_expiry(item.get("expires_at")?)?;
    Some(TimedAllowEntry { domain, expires_at })
}

/// Accepts unix seconds (number or numeric string), RFC 3339, or a naive ISO
/// timestamp in local time.
fn parse_expiry(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(secs) = s.parse::<i64>() {
                return Some(secs);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp());
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .and_then(|naive| naive.and_local_timezone(Local).earliest())
                .map(|dt| dt.timestamp())
        }
        _ => None,
    }
}
