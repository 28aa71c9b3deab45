// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod telemetry;

pub use crate::api::router;
pub use crate::ingest::types::{AlertLevel, AlertReading, Source};
pub use crate::ingest::AlertService;
pub use crate::telemetry::init_tracing;

/// Build the full router from on-disk/env configuration (no metrics route).
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = config::AlertConfig::load_default()?;
    let service = AlertService::from_config(&cfg)?;
    tracing::info!(
        volcano = %cfg.volcano,
        sources = cfg.sources.len(),
        freshness_secs = cfg.freshness_secs,
        "alert service configured"
    );
    Ok(api::router(service))
}
