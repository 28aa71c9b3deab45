//! Volcano alert service: binary entrypoint.
//! Boots the Axum HTTP server with the alert routes and Prometheus metrics.

use shuttle_axum::ShuttleAxum;

use volcano_alert::telemetry::Metrics;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    volcano_alert::init_tracing();

    let metrics = Metrics::init()?;
    let router = volcano_alert::app().await?.merge(metrics.router());

    Ok(router.into())
}
