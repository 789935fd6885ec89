use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use super::parse_object;

const DEFAULT_TIMEOUT_SECS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DohEndpoint {
    Primary,
    Secondary,
}

impl fmt::Display for DohEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DohEndpoint::Primary => f.write_str("primary"),
            DohEndpoint::Secondary => f.write_str("secondary"),
        }
    }
}

/// DNS-over-HTTPS upstream configuration.
///
/// ```json
/// {"primary": "https://cloudflare-dns.com/dns-query",
///  "secondary": "https://dns.google/dns-query",
///  "timeout_seconds": 3}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DohConfig {
    pub primary: Option<Url>,
    pub secondary: Option<Url>,
    /// Shared by both endpoints.
    pub timeout: Duration,
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: None,
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl DohConfig {
    pub fn from_json(text: &str) -> Self {
        let Some(root) = parse_object(text, "DoH") else {
            return Self::default();
        };

        let timeout = root
            .get("timeout_seconds")
            .and_then(timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            primary: root.get("primary").and_then(|v| endpoint_url(v, DohEndpoint::Primary)),
            secondary: root.get("secondary").and_then(|v| endpoint_url(v, DohEndpoint::Secondary)),
            timeout: Duration::from_secs_f64(timeout),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Configured endpoints in attempt order.
    pub fn endpoints(&self) -> impl Iterator<Item = (DohEndpoint, &Url)> {
        [
            (DohEndpoint::Primary, self.primary.as_ref()),
            (DohEndpoint::Secondary, self.secondary.as_ref()),
        ]
        .into_iter()
        .filter_map(|(endpoint, url)| url.map(|url| (endpoint, url)))
    }
}

/// Blank means "not configured"; anything that is not an http(s) URL is dropped.
fn endpoint_url(value: &Value, endpoint: DohEndpoint) -> Option<Url> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "https" | "http") => Some(url),
        Ok(url) => {
            tracing::warn!("Ignoring {} DoH endpoint with scheme {}", endpoint, url.scheme());
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring invalid {} DoH endpoint '{}': {}", endpoint, raw, e);
            None
        }
    }
}

/// Positive finite seconds, given as number or numeric string.
fn timeout_secs(value: &Value) -> Option<f64> {
    let secs = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (secs.is_finite() && secs > 0.0).then_some(secs)
}
