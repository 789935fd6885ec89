use anyhow::Result;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dns: DnsConfig,
    pub upstream: UpstreamConfig,
    pub documents: DocumentsConfig,
    pub profiles: ProfilesConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_dns_port")]
    pub port: u16,
    /// Address handed out for blocked A queries.
    #[serde(default = "default_sinkhole_ip")]
    pub sinkhole_ip: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Plain-UDP resolver used when DoH is unconfigured or exhausted.
    #[serde(default = "default_plain_upstream")]
    pub plain: String,
    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_secs: u64,
}

/// Locations and cache lifetimes of the externally maintained policy documents.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_policy_file")]
    pub policy_file: String,
    #[serde(default = "default_devices_file")]
    pub devices_file: String,
    #[serde(default = "default_active_profile_file")]
    pub active_profile_file: String,
    #[serde(default = "default_timed_allow_file")]
    pub timed_allow_file: String,
    #[serde(default = "default_doh_file")]
    pub doh_file: String,
    #[serde(default = "default_policy_ttl")]
    pub policy_ttl_secs: u64,
    #[serde(default = "default_devices_ttl")]
    pub devices_ttl_secs: u64,
    #[serde(default = "default_doh_ttl")]
    pub doh_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    /// Used when neither the device directory nor the active-profile marker names one.
    #[serde(default = "default_fallback_profile")]
    pub fallback: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Append decision log lines here instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_bind() -> String { "127.0.0.1".to_string() }
fn default_dns_port() -> u16 { 53 }
fn default_sinkhole_ip() -> Ipv4Addr { Ipv4Addr::UNSPECIFIED }
fn default_plain_upstream() -> String { "1.1.1.1:53".to_string() }
fn default_fallback_timeout() -> u64 { 5 }
fn default_documents_dir() -> PathBuf { PathBuf::from(".") }
fn default_policy_file() -> String { "policy.json".to_string() }
fn default_devices_file() -> String { "devices.json".to_string() }
fn default_active_profile_file() -> String { "active-profile.txt".to_string() }
fn default_timed_allow_file() -> String { "timed-allow.json".to_string() }
fn default_doh_file() -> String { "doh.json".to_string() }
fn default_policy_ttl() -> u64 { 3 }
fn default_devices_ttl() -> u64 { 3 }
fn default_doh_ttl() -> u64 { 5 }
fn default_fallback_profile() -> String { "Kids".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            dns: DnsConfig {
                bind: default_bind(),
                port: default_dns_port(),
                sinkhole_ip: default_sinkhole_ip(),
            },
            upstream: UpstreamConfig {
                plain: default_plain_upstream(),
                fallback_timeout_secs: default_fallback_timeout(),
            },
            documents: DocumentsConfig::in_dir(default_documents_dir()),
            profiles: ProfilesConfig { fallback: default_fallback_profile() },
            log: LogConfig::default(),
        }
    }
}

impl DocumentsConfig {
    /// Default file names and TTLs rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            policy_file: default_policy_file(),
            devices_file: default_devices_file(),
            active_profile_file: default_active_profile_file(),
            timed_allow_file: default_timed_allow_file(),
            doh_file: default_doh_file(),
            policy_ttl_secs: default_policy_ttl(),
            devices_ttl_secs: default_devices_ttl(),
            doh_ttl_secs: default_doh_ttl(),
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

impl UpstreamConfig {
    pub fn plain_addr(&self) -> Result<SocketAddr> {
        parse_upstream(&self.plain)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.dns.bind, self.dns.port)
    }
}

/// Accepts "ip" or "ip:port"; a bare IP gets port 53.
pub fn parse_upstream(upstream: &str) -> Result<SocketAddr> {
    let upstream = upstream.trim();
    if let Ok(addr) = upstream.parse::<SocketAddr>() {
        return Ok(addr);
    }
    match upstream.parse::<IpAddr>() {
        Ok(ip) => Ok(SocketAddr::new(ip, 53)),
        Err(_) => anyhow::bail!("CONFIG ERROR: invalid upstream address '{}'", upstream),
    }
}

pub fn validate(cfg: &Config) -> Result<()> {
    cfg.upstream.plain_addr()?;

    if cfg.upstream.fallback_timeout_secs == 0 {
        anyhow::bail!("CONFIG ERROR: upstream.fallback_timeout_secs must be at least 1");
    }

    if cfg.profiles.fallback.trim().is_empty() {
        anyhow::bail!("CONFIG ERROR: profiles.fallback must name a profile");
    }

    if !Path::new(&cfg.documents.dir).is_dir() {
        tracing::warn!(
            "Documents directory {} does not exist; running with empty policy",
            cfg.documents.dir.display()
        );
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

/// Read settings without validating them (tracing may not be set up yet).
pub fn read() -> Result<Config> {
    let cfg: Config = config::Config::builder()
        .add_source(config::File::with_name("guardian-dns").required(false))
        .add_source(config::Environment::with_prefix("GUARDIAN_DNS").separator("__"))
        .set_default("dns.bind", default_bind())?
        .set_default("dns.port", i64::from(default_dns_port()))?
        .set_default("dns.sinkhole_ip", default_sinkhole_ip().to_string())?
        .set_default("upstream.plain", default_plain_upstream())?
        .set_default("upstream.fallback_timeout_secs", default_fallback_timeout() as i64)?
        .set_default("documents.dir", ".")?
        .set_default("documents.policy_file", default_policy_file())?
        .set_default("documents.devices_file", default_devices_file())?
        .set_default("documents.active_profile_file", default_active_profile_file())?
        .set_default("documents.timed_allow_file", default_timed_allow_file())?
        .set_default("documents.doh_file", default_doh_file())?
        .set_default("documents.policy_ttl_secs", default_policy_ttl() as i64)?
        .set_default("documents.devices_ttl_secs", default_devices_ttl() as i64)?
        .set_default("documents.doh_ttl_secs", default_doh_ttl() as i64)?
        .set_default("profiles.fallback", default_fallback_profile())?
        .build()?
        .try_deserialize()?;

    Ok(cfg)
}
