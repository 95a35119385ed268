//! HTTP Endpoints
//!
//! Health, readiness, metrics and connection listing next to the
//! WebSocket route.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use voice_order_config::ServerConfig;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/connections", get(list_connections))
        .route(&server.ws_path, get(ws_handler));

    if state.config.observability.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router = router.layer(TraceLayer::new_for_http());
    if let Some(cors) = cors_layer(server) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS from settings; an empty origin list or `*` allows any origin
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.connections.count(),
    }))
}

/// Readiness check; not ready without any transcription backend
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let backends = &state.services.backends;
    let local = backends.local.as_ref().map(|b| b.name().to_string());
    let remote = backends.remote.as_ref().map(|b| b.name().to_string());
    let ready = local.is_some() || remote.is_some();

    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no_backends")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "connections": state.connections.count(),
            "capacity": state.connections.capacity(),
            "backends": { "local": local, "remote": remote },
        })),
    )
}

/// List live connections
async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.connections.list();
    Json(serde_json::json!({
        "count": connections.len(),
        "connections": connections,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voice_order_config::Settings;
    use voice_order_pipeline::stt::testing::ScriptedBackend;
    use voice_order_pipeline::Backends;

    use crate::connection::ConnectionServices;
    use crate::dialogue::NoopDialogue;

    fn state(backends: Backends) -> AppState {
        let settings = Settings::default();
        let services = ConnectionServices::new(&settings, backends, Arc::new(NoopDialogue), None);
        AppState::new(settings, services)
    }

    #[test]
    fn test_router_creation() {
        let _ = create_router(state(Backends::default()));
    }

    #[test]
    fn test_cors_layer_from_config() {
        let mut config = ServerConfig::default();
        config.cors_enabled = false;
        assert!(cors_layer(&config).is_none());

        config.cors_enabled = true;
        config.cors_origins = vec!["https://kiosk.example.com".to_string()];
        assert!(cors_layer(&config).is_some());
    }

    #[tokio::test]
    async fn test_readiness_requires_backend() {
        let response = readiness_check(State(state(Backends::default()))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let backends = Backends {
            local: Some(Arc::new(ScriptedBackend::new("local"))),
            remote: None,
        };
        let response = readiness_check(State(state(backends))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_connections_listed() {
        let state = state(Backends::default());
        let _guard = state.connections.register().unwrap();

        let response = list_connections(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.connections.list().len(), 1);
    }
}
