// src/ingest/mod.rs
//! # Ingestion Orchestrator
//! Walks the source registry in order (fetch → extract → normalize), stops at
//! the first source that yields a level, and falls back to a static reading
//! when none does. Results go through the Cache Gate; `get_reading` never fails.

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod types;

use anyhow::Result;
use chrono::NaiveDate;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::CacheGate;
use crate::clock::{Clock, SystemClock};
use crate::config::AlertConfig;
use crate::ingest::extract::Extractor;
use crate::ingest::fetch::HttpFetcher;
use crate::ingest::normalize::Normalizer;
use crate::ingest::types::{AlertReading, BulletinFetcher, FetchError, Source};

/// Source marker used when a cycle dies before producing a reading.
pub const ERROR_FALLBACK_SOURCE: &str = "error-fallback";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alert_ingest_cycles_total", "Ingestion cycles started.");
        describe_counter!(
            "alert_source_errors_total",
            "Sources that failed to fetch (direct and proxy)."
        );
        describe_counter!(
            "alert_extraction_miss_total",
            "Fetched sources without a recognizable alert level."
        );
        describe_counter!("alert_proxy_used_total", "Fetches routed through the proxy.");
        describe_counter!(
            "alert_fallback_total",
            "Cycles that ended on the static fallback reading."
        );
        describe_counter!("alert_cache_hits_total", "Readings served from the cache.");
        describe_counter!(
            "alert_cache_misses_total",
            "Requests that triggered an ingestion cycle."
        );
        describe_histogram!("alert_ingest_cycle_ms", "Ingestion cycle time in milliseconds.");
        describe_gauge!("alert_cache_freshness_secs", "Cache Gate freshness window.");
    });
}

/// Why a single source did not produce a reading.
#[derive(Debug, thiserror::Error)]
pub enum SourceMiss {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("no alert level found")]
    NoLevel,
}

struct Inner {
    sources: Vec<Source>,
    fetcher: Arc<dyn BulletinFetcher>,
    extractor: Extractor,
    normalizer: Normalizer,
    cache: Arc<CacheGate>,
    clock: Arc<dyn Clock>,
    // Held for the whole cycle; at most one cycle in flight.
    refresh: Arc<Mutex<()>>,
}

/// Cheap to clone; clones share the cache and the in-flight cycle.
#[derive(Clone)]
pub struct AlertService {
    inner: Arc<Inner>,
}

impl AlertService {
    pub fn new(
        cfg: &AlertConfig,
        fetcher: Arc<dyn BulletinFetcher>,
        cache: Arc<CacheGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ensure_metrics_described();
        gauge!("alert_cache_freshness_secs").set(cache.window().as_secs_f64());
        Self {
            inner: Arc::new(Inner {
                sources: cfg.sources.clone(),
                fetcher,
                extractor: Extractor::new(&cfg.volcano),
                normalizer: Normalizer::new(cfg.volcano.clone(), cfg.fallback.clone()),
                cache,
                clock,
                refresh: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Production wiring: HTTP fetcher, wall clock, cold cache.
    pub fn from_config(cfg: &AlertConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch)?);
        let cache = Arc::new(CacheGate::new(cfg.freshness(), clock.clone()));
        Ok(Self::new(cfg, fetcher, cache, clock))
    }

    pub fn cache(&self) -> &CacheGate {
        &self.inner.cache
    }

    pub fn fallback_reading(&self) -> AlertReading {
        self.inner.normalizer.fallback_reading()
    }

    /// Current reading. Fresh cache → no I/O. Stale cache while another cycle
    /// runs → the stale entry. Otherwise one ingestion cycle.
    pub async fn get_reading(&self) -> AlertReading {
        let inner = &self.inner;
        if let Some(hit) = inner.cache.fresh() {
            counter!("alert_cache_hits_total").increment(1);
            return hit.reading.as_cached();
        }

        let guard = match inner.refresh.clone().try_lock_owned() {
            Ok(g) => g,
            Err(_) => {
                if let Some(stale) = inner.cache.get() {
                    tracing::debug!(target: "ingest", "refresh in flight; serving stale reading");
                    counter!("alert_cache_hits_total").increment(1);
                    return stale.reading.as_cached();
                }
                inner.refresh.clone().lock_owned().await
            }
        };
        // Another cycle may have landed while we waited for the guard.
        if let Some(hit) = inner.cache.fresh() {
            counter!("alert_cache_hits_total").increment(1);
            return hit.reading.as_cached();
        }
        counter!("alert_cache_misses_total").increment(1);

        // The cycle runs detached: it completes (and fills the cache) even if
        // this caller goes away, and a panic inside it stays contained.
        let cycle = {
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                let _guard = guard;
                let reading = inner.ingest().await;
                inner.cache.put(reading.clone());
                reading
            })
        };
        match cycle.await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, "ingestion cycle aborted");
                inner.normalizer.fallback_with_source(ERROR_FALLBACK_SOURCE)
            }
        }
    }
}

impl Inner {
    async fn ingest(&self) -> AlertReading {
        let t0 = std::time::Instant::now();
        counter!("alert_ingest_cycles_total").increment(1);
        let today = self.clock.now().date_naive();

        let mut reading = None;
        for source in &self.sources {
            match self.attempt(source, today).await {
                Ok(r) => {
                    reading = Some(r);
                    break;
                }
                Err(SourceMiss::NoLevel) => {
                    counter!("alert_extraction_miss_total", "source" => source.label.clone())
                        .increment(1);
                    tracing::info!(target: "ingest", source = %source.label, "no alert level in bulletin");
                }
                Err(SourceMiss::Fetch(e)) => {
                    counter!("alert_source_errors_total", "source" => source.label.clone())
                        .increment(1);
                    tracing::warn!(
                        target: "ingest",
                        source = %source.label,
                        fetcher = self.fetcher.name(),
                        error = %e,
                        "source unavailable"
                    );
                }
            }
        }

        let reading = reading.unwrap_or_else(|| {
            counter!("alert_fallback_total").increment(1);
            tracing::warn!(
                target: "ingest",
                sources = self.sources.len(),
                "all sources exhausted; using fallback reading"
            );
            self.normalizer.fallback_reading()
        });

        histogram!("alert_ingest_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "ingest",
            level = %reading.alert_level,
            source = %reading.source,
            updated_at = %reading.updated_at,
            "ingestion cycle complete"
        );
        reading
    }

    async fn attempt(&self, source: &Source, today: NaiveDate) -> Result<AlertReading, SourceMiss> {
        let fetched = self.fetcher.fetch(source).await?;
        let signal = self.extractor.extract_scoped(&fetched.body, source.narrow);
        self.normalizer
            .normalize(&signal, &source.label, fetched.via_proxy, today)
            .ok_or(SourceMiss::NoLevel)
    }
}
