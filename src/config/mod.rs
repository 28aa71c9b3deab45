// src/config/mod.rs
//! Service configuration: volcano of interest, source registry, fetch budgets,
//! cache window and fallback constants. Loaded once at startup.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::types::{AlertLevel, Source};

pub const ENV_CONFIG_PATH: &str = "ALERT_CONFIG_PATH";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "ALERT_FETCH_TIMEOUT_SECS";
pub const DEFAULT_TOML_PATH: &str = "config/alert.toml";
pub const DEFAULT_JSON_PATH: &str = "config/alert.json";

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

fn default_volcano() -> String {
    "Mayon".to_string()
}
fn default_freshness_secs() -> u64 {
    15 * 60
}
fn default_sources() -> Vec<Source> {
    vec![Source::new(
        "https://wovodat.phivolcs.dost.gov.ph/bulletin/list-of-bulletin",
        "PHIVOLCS Menu",
    )]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_volcano")]
    pub volcano: String,
    /// Cache Gate window in seconds.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Ordered by preference; the first is the most authoritative.
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            volcano: default_volcano(),
            freshness_secs: default_freshness_secs(),
            fetch: FetchConfig::default(),
            fallback: FallbackConfig::default(),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub proxy_timeout_secs: u64,
    /// Ceiling for direct + proxy attempts combined.
    pub total_timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
    /// Forwarding proxy taking `?url=`; empty disables the proxy path.
    pub proxy_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            proxy_timeout_secs: 10,
            total_timeout_secs: 20,
            user_agent: BROWSER_UA.to_string(),
            accept: BROWSER_ACCEPT.to_string(),
            proxy_url: "https://api.allorigins.win/get".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
    pub fn proxy(&self) -> Option<&str> {
        let p = self.proxy_url.trim();
        (!p.is_empty()).then_some(p)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub level: AlertLevel,
    pub date: String,
    pub source: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            level: AlertLevel::clamped(3),
            date: "January 2026".to_string(),
            source: "fallback".to_string(),
        }
    }
}

impl AlertConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    /// Load from an explicit path. TOML or JSON, by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading alert config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing alert config {}", path.display()))?;
        cfg.validated()
    }

    /// Resolve the config file:
    /// 1) $ALERT_CONFIG_PATH
    /// 2) config/alert.toml
    /// 3) config/alert.json
    /// 4) built-in defaults
    ///
    /// `ALERT_FETCH_TIMEOUT_SECS` then overrides the direct fetch timeout.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };

        if let Ok(raw) = std::env::var(ENV_FETCH_TIMEOUT_SECS) {
            cfg.fetch.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_SECS}={raw:?} is not a number"))?;
        }
        cfg.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.volcano = self.volcano.trim().to_string();
        if self.volcano.is_empty() {
            bail!("volcano name must not be empty");
        }
        if self.freshness_secs == 0 {
            bail!("freshness_secs must be > 0");
        }
        if self.fetch.timeout_secs == 0 || self.fetch.proxy_timeout_secs == 0 {
            bail!("fetch timeouts must be > 0");
        }
        // Total ceiling can never be shorter than the direct attempt.
        if self.fetch.total_timeout_secs < self.fetch.timeout_secs {
            self.fetch.total_timeout_secs = self.fetch.timeout_secs;
        }
        self.sources.retain(|s| {
            let keep = !s.url.trim().is_empty() && !s.label.trim().is_empty();
            if !keep {
                tracing::warn!(target: "config", url = %s.url, "dropping source without url or label");
            }
            keep
        });
        Ok(self)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AlertConfig> {
    match hint_ext {
        "toml" => return Ok(toml::from_str(s)?),
        "json" => return Ok(serde_json::from_str(s)?),
        _ => {}
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported alert config format: {e}"))
}
