use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::ingest::normalize::{legend, LevelInfo};
use crate::ingest::AlertService;

#[derive(Clone)]
pub struct AppState {
    pub alerts: AlertService,
}

/// `Cache-Control` telling intermediaries to keep the response for the same
/// window the Cache Gate uses.
pub fn cache_control_value(window_secs: u64) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "s-maxage={window_secs}, stale-while-revalidate"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("s-maxage=900, stale-while-revalidate"))
}

pub fn router(alerts: AlertService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/api/alert",
            // axum answers HEAD with the GET handler unless HEAD has its own
            // endpoint. OPTIONS is answered by the CORS layer.
            get(get_alert)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/api/alert/levels", get(get_levels))
        .layer(cors)
        .with_state(AppState { alerts })
}

async fn get_alert(State(state): State<AppState>) -> Response {
    let reading = state.alerts.get_reading().await;
    let window = state.alerts.cache().window().as_secs();
    (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, cache_control_value(window)),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET"),
            ),
        ],
        Json(reading),
    )
        .into_response()
}

async fn get_levels() -> Json<Vec<LevelInfo>> {
    Json(legend())
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static("GET, OPTIONS"))],
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_control_mirrors_window() {
        assert_eq!(
            cache_control_value(900).to_str().unwrap(),
            "s-maxage=900, stale-while-revalidate"
        );
        assert_eq!(
            cache_control_value(60).to_str().unwrap(),
            "s-maxage=60, stale-while-revalidate"
        );
    }
}
