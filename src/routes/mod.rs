//! Route definitions for the CodePulse API.

pub mod applications;
pub mod dashboard;
pub mod health;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the full router: health checks at the root, the JSON API under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app_routes = Router::new()
        .route("/applications", get(applications::list))
        .route("/applications/{id}", get(applications::get_by_id))
        .route("/applications/{id}/issues", get(applications::issues))
        .route("/applications/{id}/summaries", get(applications::summaries))
        .route("/applications/{id}/scan-runs", get(applications::scan_runs))
        .route("/applications/{id}/scan", post(applications::trigger_scan));

    let dashboard_routes = Router::new().route("/dashboard/stats", get(dashboard::stats));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", app_routes)
        .nest("/api/v1", dashboard_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
