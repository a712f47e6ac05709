// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::classify::TimestampPolicy;
use crate::source::traewelling::DEFAULT_BASE_URL;

const ENV_CONFIG_PATH: &str = "EXPORTER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/exporter.toml";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_METRICS_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub token: Option<String>,
    pub usernames: Vec<String>,
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub metrics_port: u16,
    pub timestamp_policy: TimestampPolicy,
    pub metrics_idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            usernames: Vec::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            metrics_port: DEFAULT_METRICS_PORT,
            timestamp_policy: TimestampPolicy::default(),
            metrics_idle_timeout: None,
        }
    }
}

/// Optional file layer. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    token: Option<String>,
    usernames: Option<Vec<String>>,
    base_url: Option<String>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    metrics_port: Option<u16>,
    timestamp_source: Option<String>,
    metrics_idle_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config using file + env:
    /// 1) $EXPORTER_CONFIG_PATH (must exist if set)
    /// 2) config/exporter.toml (if present)
    /// 3) environment variables override whatever the file set
    pub fn load() -> Result<Self> {
        let mut cfg = Config::default();
        if let Some(path) = config_file_path()? {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            cfg = Config::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?;
        }
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.clamp_idle_timeout();
        Ok(cfg)
    }

    /// Smallest idle timeout that keeps live gauges through one late cycle.
    pub fn min_idle_timeout(&self) -> Duration {
        self.poll_interval * 2
    }

    /// A gauge is only re-set once per poll, so an idle timeout at or below the
    /// poll interval would expire live series between cycles. Raise it.
    fn clamp_idle_timeout(&mut self) {
        let floor = self.min_idle_timeout();
        if let Some(ttl) = self.metrics_idle_timeout {
            if ttl < floor {
                tracing::warn!(
                    requested_secs = ttl.as_secs(),
                    using_secs = floor.as_secs(),
                    "metrics idle timeout shorter than two poll intervals; raising it"
                );
                self.metrics_idle_timeout = Some(floor);
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let f: FileConfig = toml::from_str(s)?;
        let mut cfg = Config::default();
        if let Some(t) = f.token {
            cfg.token = non_empty(&t);
        }
        if let Some(list) = f.usernames {
            cfg.usernames = clean_list(list);
        }
        if let Some(u) = f.base_url {
            cfg.base_url = u;
        }
        if let Some(s) = f.poll_interval_secs {
            cfg.poll_interval = Duration::from_secs(s.max(1));
        }
        if let Some(s) = f.request_timeout_secs {
            cfg.request_timeout = Duration::from_secs(s.max(1));
        }
        if let Some(p) = f.metrics_port {
            cfg.metrics_port = p;
        }
        if let Some(src) = f.timestamp_source {
            cfg.timestamp_policy = TimestampPolicy::parse(&src)
                .ok_or_else(|| anyhow!("unknown timestamp_source '{src}'"))?;
        }
        if let Some(s) = f.metrics_idle_timeout_secs {
            cfg.metrics_idle_timeout = (s > 0).then(|| Duration::from_secs(s));
        }
        Ok(cfg)
    }

    /// Overlay environment values. Bad numbers keep the current value and warn.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(t) = get("TRAEWELLING_TOKEN") {
            self.token = non_empty(&t);
        }
        if let Some(list) = get("TRAEWELLING_USERNAMES") {
            self.usernames = parse_usernames(&list);
        }
        if let Some(u) = get("TRAEWELLING_BASE_URL").and_then(|u| non_empty(&u)) {
            self.base_url = u;
        }
        if let Some(s) = parse_num::<u64, _>(&get, "POLL_INTERVAL_SECS") {
            self.poll_interval = Duration::from_secs(s.max(1));
        }
        if let Some(s) = parse_num::<u64, _>(&get, "REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(s.max(1));
        }
        if let Some(p) = parse_num::<u16, _>(&get, "METRICS_PORT") {
            self.metrics_port = p;
        }
        if let Some(v) = get("TIMESTAMP_SOURCE") {
            match TimestampPolicy::parse(&v) {
                Some(p) => self.timestamp_policy = p,
                None => tracing::warn!(value = %v, "TIMESTAMP_SOURCE not recognised; keeping {:?}", self.timestamp_policy),
            }
        }
        if let Some(s) = parse_num::<u64, _>(&get, "METRICS_IDLE_TIMEOUT_SECS") {
            self.metrics_idle_timeout = (s > 0).then(|| Duration::from_secs(s));
        }
    }
}

fn config_file_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let default = Path::new(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then(|| default.to_path_buf()))
}

fn parse_num<T, G>(get: &G, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable number");
            None
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Split a comma-separated account list. Entries are trimmed; empty entries
/// are dropped; order and case are preserved.
pub fn parse_usernames(raw: &str) -> Vec<String> {
    clean_list(raw.split(',').map(str::to_string))
}

fn clean_list(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
