// src/ingest/normalize.rs
//! Maps extracted signals onto the public `AlertReading` shape.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::FallbackConfig;
use crate::ingest::types::{AlertLevel, AlertReading, ExtractedSignal};

pub const PROXY_SUFFIX: &str = " (via Proxy)";
pub const UNKNOWN: &str = "Unknown";

/// Index = level. 0 is calmest, 5 most severe.
const DESCRIPTIONS: [&str; 6] = [
    "No Alert - Background level",
    "Low Level Unrest",
    "Moderate Unrest",
    "High Unrest - Magmatic activity",
    "Hazardous Eruption Imminent",
    "Hazardous Eruption Ongoing",
];

const LEGEND: [(&str, &str); 6] = [
    (
        "No Alert",
        "No magmatic unrest. Background level of volcanic activity.",
    ),
    (
        "Low Level Unrest",
        "Low level volcanic earthquake activity. No imminent eruption.",
    ),
    (
        "Moderate Unrest",
        "Increased seismic activity. Possible magmatic intrusion.",
    ),
    (
        "High Unrest",
        "Relatively high unrest. Trend towards hazardous eruption.",
    ),
    (
        "Hazardous Eruption Imminent",
        "Intense unrest. Hazardous eruption imminent within days.",
    ),
    (
        "Hazardous Eruption Ongoing",
        "Hazardous eruption in progress. Pyroclastic flows possible.",
    ),
];

pub fn describe(level: AlertLevel) -> &'static str {
    DESCRIPTIONS
        .get(usize::from(level.get()))
        .copied()
        .unwrap_or(UNKNOWN)
}

/// Client-facing legend entry for one level.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LevelInfo {
    pub level: u8,
    pub description: &'static str,
    pub short: &'static str,
    pub detail: &'static str,
}

pub fn level_info(level: u8) -> LevelInfo {
    match (AlertLevel::new(level), LEGEND.get(usize::from(level))) {
        (Some(l), Some(&(short, detail))) => LevelInfo {
            level,
            description: describe(l),
            short,
            detail,
        },
        _ => LevelInfo {
            level,
            description: UNKNOWN,
            short: UNKNOWN,
            detail: "Unable to determine current alert level.",
        },
    }
}

pub fn legend() -> Vec<LevelInfo> {
    (0..=AlertLevel::MAX).map(level_info).collect()
}

/// Builds readings for one volcano; owns the fallback constants.
#[derive(Debug, Clone)]
pub struct Normalizer {
    volcano: String,
    fallback: FallbackConfig,
}

impl Normalizer {
    pub fn new(volcano: impl Into<String>, fallback: FallbackConfig) -> Self {
        Self {
            volcano: volcano.into(),
            fallback,
        }
    }

    /// `None` when the signal carries no level. `today` fills a missing date.
    pub fn normalize(
        &self,
        signal: &ExtractedSignal,
        source_label: &str,
        used_proxy: bool,
        today: NaiveDate,
    ) -> Option<AlertReading> {
        let level = signal.level?;
        let updated_at = signal
            .date
            .clone()
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        let source = if used_proxy {
            format!("{source_label}{PROXY_SUFFIX}")
        } else {
            source_label.to_string()
        };
        Some(AlertReading {
            volcano: self.volcano.clone(),
            alert_level: level,
            description: describe(level).to_string(),
            updated_at,
            source,
            cached: false,
        })
    }

    /// Static reading used once every source is exhausted.
    pub fn fallback_reading(&self) -> AlertReading {
        self.fallback_with_source(&self.fallback.source)
    }

    pub(crate) fn fallback_with_source(&self, source: &str) -> AlertReading {
        let level = self.fallback.level;
        AlertReading {
            volcano: self.volcano.clone(),
            alert_level: level,
            description: describe(level).to_string(),
            updated_at: self.fallback.date.clone(),
            source: source.to_string(),
            cached: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new("Mayon", FallbackConfig::default())
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn every_level_has_a_description() {
        for n in 0..=5 {
            let l = AlertLevel::new(n).unwrap();
            assert!(!describe(l).is_empty());
            assert_ne!(describe(l), UNKNOWN);
        }
        assert_eq!(describe(AlertLevel::new(0).unwrap()), "No Alert - Background level");
        assert_eq!(describe(AlertLevel::new(5).unwrap()), "Hazardous Eruption Ongoing");
    }

    #[test]
    fn signal_date_is_kept_and_proxy_is_marked() {
        let sig = ExtractedSignal {
            level: AlertLevel::new(3),
            date: Some("14 March 2025".into()),
        };
        let r = normalizer().normalize(&sig, "PHIVOLCS Menu", true, day()).unwrap();
        assert_eq!(r.alert_level.get(), 3);
        assert_eq!(r.description, "High Unrest - Magmatic activity");
        assert_eq!(r.updated_at, "14 March 2025");
        assert_eq!(r.source, "PHIVOLCS Menu (via Proxy)");
        assert_eq!(r.volcano, "Mayon");
        assert!(!r.cached);
    }

    #[test]
    fn missing_date_uses_today() {
        let sig = ExtractedSignal {
            level: AlertLevel::new(1),
            date: None,
        };
        let r = normalizer().normalize(&sig, "A", false, day()).unwrap();
        assert_eq!(r.updated_at, "2025-06-01");
        assert_eq!(r.source, "A");
    }

    #[test]
    fn missing_level_produces_nothing() {
        let sig = ExtractedSignal {
            level: None,
            date: Some("1 May 2025".into()),
        };
        assert!(normalizer().normalize(&sig, "A", false, day()).is_none());
    }

    #[test]
    fn fallback_reading_is_constant() {
        let f = normalizer().fallback_reading();
        assert_eq!(f.alert_level.get(), 3);
        assert_eq!(f.updated_at, "January 2026");
        assert_eq!(f.source, "fallback");
        assert_eq!(f.description, "High Unrest - Magmatic activity");
        assert_eq!(f, normalizer().fallback_reading());
    }

    #[test]
    fn legend_covers_all_levels_and_unknown() {
        let l = legend();
        assert_eq!(l.len(), 6);
        assert_eq!(l[4].short, "Hazardous Eruption Imminent");
        assert_eq!(level_info(9).short, UNKNOWN);
    }
}
