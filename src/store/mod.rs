//! Policy Store: reads the policy documents and keeps short-lived snapshots.
//!
//! Policy, device directory and DoH configuration are cached for a few
//! seconds so a burst of queries does not turn into a burst of file reads.
//! Invalidation is purely time-based. The timed-allow list and the
//! active-profile marker are read fresh on every call so an expired override
//! stops applying immediately. No load ever fails: a missing or unreadable
//! document yields the empty structure.

use chrono::Utc;
use moka::future::Cache;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use crate::config::DocumentsConfig;

pub mod models;

pub use models::{DeviceDirectory, DohConfig, PolicyConfig, TimedAllowList};

/// Resolved on-disk location of every document.
#[derive(Debug, Clone)]
pub struct DocumentPaths {
    pub policy: PathBuf,
    pub devices: PathBuf,
    pub active_profile: PathBuf,
    pub timed_allow: PathBuf,
    pub doh: PathBuf,
}

impl DocumentPaths {
    pub fn from_config(docs: &DocumentsConfig) -> Self {
        Self {
            policy: docs.path(&docs.policy_file),
            devices: docs.path(&docs.devices_file),
            active_profile: docs.path(&docs.active_profile_file),
            timed_allow: docs.path(&docs.timed_allow_file),
            doh: docs.path(&docs.doh_file),
        }
    }
}

/// Single-slot snapshot cache. Filled on first use, refreshed after `ttl`.
type Snapshot<T> = Cache<(), Arc<T>>;

fn snapshot<T: Send + Sync + 'static>(ttl_secs: u64) -> Snapshot<T> {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(ttl_secs.max(1)))
        .build()
}

pub struct PolicyStore {
    paths: DocumentPaths,
    policy: Snapshot<PolicyConfig>,
    devices: Snapshot<DeviceDirectory>,
    doh: Snapshot<DohConfig>,
}

impl PolicyStore {
    pub fn new(docs: &DocumentsConfig) -> Self {
        Self {
            paths: DocumentPaths::from_config(docs),
            policy: snapshot(docs.policy_ttl_secs),
            devices: snapshot(docs.devices_ttl_secs),
            doh: snapshot(docs.doh_ttl_secs),
        }
    }

    pub async fn load_policy(&self) -> Arc<PolicyConfig> {
        self.policy
            .get_with((), async {
                let policy = read_document(&self.paths.policy)
                    .await
                    .map(|text| PolicyConfig::from_json(&text))
                    .unwrap_or_default();
                tracing::debug!(
                    "Policy loaded: {} global allow, {} global block, {} profiles, {} legacy",
                    policy.global.allow.len(),
                    policy.global.block.len(),
                    policy.profiles.len(),
                    policy.legacy_block.len(),
                );
                Arc::new(policy)
            })
            .await
    }

    pub async fn load_device_directory(&self) -> Arc<DeviceDirectory> {
        self.devices
            .get_with((), async {
                let directory = read_document(&self.paths.devices)
                    .await
                    .map(|text| DeviceDirectory::from_json(&text))
                    .unwrap_or_default();
                tracing::debug!("Device directory loaded: {} devices", directory.devices.len());
                Arc::new(directory)
            })
            .await
    }

    pub async fn load_doh_config(&self) -> Arc<DohConfig> {
        self.doh
            .get_with((), async {
                let doh = read_document(&self.paths.doh)
                    .await
                    .map(|text| DohConfig::from_json(&text))
                    .unwrap_or_default();
                tracing::debug!("DoH config loaded: configured={}", doh.is_configured());
                Arc::new(doh)
            })
            .await
    }

    /// Not cached.
    pub async fn load_timed_allow_list(&self) -> TimedAllowList {
        read_document(&self.paths.timed_allow)
            .await
            .map(|text| TimedAllowList::from_json(&text, Utc::now()))
            .unwrap_or_default()
    }

    /// Not cached. A blank marker counts as absent.
    pub async fn load_active_profile(&self) -> Option<String> {
        let text = read_document(&self.paths.active_profile).await?;
        let name = text.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Read a UTF-8 document, tolerating a leading byte-order mark.
async fn read_document(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::trace!("Document {} not present", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}
