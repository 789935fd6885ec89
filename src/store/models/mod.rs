//! Explicit schemas for the externally maintained policy documents.
//!
//! Every document is coerced once at load time. A document that cannot be
//! parsed at all yields the empty/default structure; a single bad entry is
//! skipped and its siblings are kept.

pub mod device;
pub mod doh;
pub mod policy;
pub mod timed_allow;

pub use device::DeviceDirectory;
pub use doh::{DohConfig, DohEndpoint};
pub use policy::{PolicyConfig, RuleLists};
pub use timed_allow::{TimedAllowEntry, TimedAllowList};

/// Parse a document root, requiring a JSON object.
pub(crate) fn parse_object(
    text: &str,
    document: &str,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!("{} document is not a JSON object, ignoring it", document);
            None
        }
        Err(e) => {
            tracing::warn!("{} document is malformed, ignoring it: {}", document, e);
            None
        }
    }
}
