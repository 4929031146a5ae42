//! API routes.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{convert, health_live, health_ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, metrics_guard, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Builds the router: one convert route, a liveness probe, and an optional
/// Prometheus endpoint — the only HTTP surface this service exposes besides
/// health and metrics.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let convert_routes = Router::new().route("/convert", get(convert));

    let health_routes = Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new()
            .route("/metrics", get(move || async move { handle.render() }))
            .layer(middleware::from_fn_with_state(state.config.clone(), metrics_guard))
    } else {
        Router::new()
    };

    Router::new()
        .merge(convert_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
