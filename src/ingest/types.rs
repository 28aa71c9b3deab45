// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// One candidate bulletin location. Order in the registry is preference order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    #[serde(alias = "name")]
    pub label: String,
    /// Narrow extraction to the section whose heading names the volcano.
    #[serde(default)]
    pub narrow: bool,
}

impl Source {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            narrow: false,
        }
    }

    pub fn narrowed(mut self) -> Self {
        self.narrow = true;
        self
    }
}

/// Discrete alert level, always within 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AlertLevel(u8);

impl AlertLevel {
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::MAX).then_some(Self(level))
    }

    /// Saturates at 5; for constants.
    pub const fn clamped(level: u8) -> Self {
        Self(if level > Self::MAX { Self::MAX } else { level })
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::new(v).ok_or_else(|| format!("alert level {v} outside 0..=5"))
    }
}

impl From<AlertLevel> for u8 {
    fn from(l: AlertLevel) -> Self {
        l.0
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the extractor found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedSignal {
    pub level: Option<AlertLevel>,
    pub date: Option<String>,
}

/// Raw body retrieved for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBulletin {
    pub body: String,
    pub via_proxy: bool,
}

/// Why a source could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("proxy envelope unusable: {0}")]
    ProxyEnvelope(String),
    #[error("direct fetch failed ({0}) and no proxy is configured")]
    ProxyDisabled(Box<FetchError>),
    #[error("total fetch budget exhausted")]
    Budget,
}

/// The externally visible unit served to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertReading {
    pub volcano: String,
    pub alert_level: AlertLevel,
    pub description: String,
    pub updated_at: String,
    pub source: String,
    pub cached: bool,
}

impl AlertReading {
    /// Same payload, flagged as served from cache.
    pub fn as_cached(&self) -> Self {
        Self {
            cached: true,
            ..self.clone()
        }
    }
}

/// Retrieves raw bulletin content for one source. Implementations must not
/// touch shared state, so an abandoned call leaves nothing behind.
#[async_trait::async_trait]
pub trait BulletinFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<FetchedBulletin, FetchError>;
    fn name(&self) -> &'static str;
}
