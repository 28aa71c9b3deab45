// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/alert  (JSON contract, cache headers, CORS, cached flag)
// - non-GET methods -> 405, OPTIONS preflight -> 200
// - GET /api/alert/levels
// - app() built from an env-selected config file

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::Value as Json;
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use volcano_alert::cache::CacheGate;
use volcano_alert::clock::{Clock, SystemClock};
use volcano_alert::config::AlertConfig;
use volcano_alert::ingest::types::{BulletinFetcher, FetchError, FetchedBulletin, Source};
use volcano_alert::{api, AlertService};

const BODY_LIMIT: usize = 1024 * 1024;

struct FixedFetcher(Result<&'static str, u16>);

#[async_trait]
impl BulletinFetcher for FixedFetcher {
    async fn fetch(&self, _source: &Source) -> Result<FetchedBulletin, FetchError> {
        match self.0 {
            Ok(body) => Ok(FetchedBulletin {
                body: body.to_string(),
                via_proxy: false,
            }),
            Err(code) => Err(FetchError::Status(code)),
        }
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn test_router(page: Result<&'static str, u16>) -> Router {
    let cfg = AlertConfig {
        sources: vec![Source::new("https://bulletins.test/mayon", "Test Bulletin")],
        ..AlertConfig::default()
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(CacheGate::new(cfg.freshness(), clock.clone()));
    let svc = AlertService::new(&cfg, Arc::new(FixedFetcher(page)), cache, clock);
    api::router(svc)
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("origin", "https://app.example")
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = test_router(Err(503)).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn alert_returns_reading_with_cache_and_cors_headers() {
    let app = test_router(Ok(
        "<div>Current status: Alert Level 2 issued. As of 14 March 2025.</div>",
    ));

    let resp = app.clone().oneshot(get("/api/alert")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let h = resp.headers();
    assert_eq!(
        h.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("s-maxage=900, stale-while-revalidate")
    );
    assert_eq!(
        h.get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let v = read_json(resp).await;
    assert_eq!(v["volcano"], "Mayon");
    assert_eq!(v["alertLevel"], 2);
    assert_eq!(v["description"], "Moderate Unrest");
    assert_eq!(v["updatedAt"], "14 March 2025");
    assert_eq!(v["source"], "Test Bulletin");
    assert_eq!(v["cached"], false);

    // Same router instance shares the cache.
    let again = read_json(app.oneshot(get("/api/alert")).await.unwrap()).await;
    assert_eq!(again["cached"], true);
    assert_eq!(again["alertLevel"], 2);
}

#[tokio::test]
async fn degraded_answer_is_still_200() {
    let resp = test_router(Err(503)).oneshot(get("/api/alert")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["source"], "fallback");
    assert_eq!(v["alertLevel"], 3);
    assert_eq!(v["updatedAt"], "January 2026");
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    for method in ["POST", "PUT", "DELETE", "PATCH"] {
        let req = Request::builder()
            .method(method)
            .uri("/api/alert")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(Err(503)).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        let v = read_json(resp).await;
        assert_eq!(v["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn head_is_rejected_without_running_a_cycle() {
    let app = test_router(Ok("<p>Alert Level 2 is in effect.</p>"));
    let req = Request::builder()
        .method("HEAD")
        .uri("/api/alert")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    // the first GET still computes: HEAD left the cache cold
    let resp = app.oneshot(get("/api/alert")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["cached"], false);
    assert_eq!(v["alertLevel"], 2);
}

#[tokio::test]
async fn preflight_is_answered() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/alert")
        .header("origin", "https://app.example")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .unwrap();
    let resp = test_router(Err(503)).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let methods = resp
        .headers()
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(methods.contains("GET"), "allow-methods was {methods:?}");
}

#[tokio::test]
async fn levels_legend_lists_all_six() {
    let resp = test_router(Err(503))
        .oneshot(get("/api/alert/levels"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 6);
    assert_eq!(arr[0]["short"], "No Alert");
    assert_eq!(arr[5]["description"], "Hazardous Eruption Ongoing");
}

#[serial_test::serial]
#[tokio::test]
async fn app_reads_config_from_env_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("alert.toml");
    std::fs::write(
        &path,
        "volcano = \"Taal\"\nfreshness_secs = 60\nsources = []\n\n[fallback]\nlevel = 1\ndate = \"March 2026\"\n",
    )
    .unwrap();
    std::env::set_var("ALERT_CONFIG_PATH", path.display().to_string());

    let app = volcano_alert::app().await.expect("app() should build Router");
    std::env::remove_var("ALERT_CONFIG_PATH");

    let resp = app.oneshot(get("/api/alert")).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("s-maxage=60, stale-while-revalidate")
    );
    let v = read_json(resp).await;
    assert_eq!(v["volcano"], "Taal");
    assert_eq!(v["alertLevel"], 1);
    assert_eq!(v["updatedAt"], "March 2026");
    assert_eq!(v["source"], "fallback");
}
