use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::infra::app_state::AppState;
use crate::{handlers, infra::config::Config};

/// Assemble the service router: banner, health, and the two transports.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        .route("/", get(service_banner))
        .route("/healthz", get(healthz))
        .route("/rfid-ws", get(handlers::device::device_ws_handler))
        .route(
            "/dashboard-ws",
            get(handlers::dashboard::dashboard_ws_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.is_wildcard_included() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

async fn service_banner() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Seamline production tracking service is running",
        "deviceSocket": "/rfid-ws",
        "dashboardSocket": "/dashboard-ws",
    }))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
        }
    }
}
