//! Combines the per-module routers into the full REST surface.
//!
//! Everything except `/health` and `/api/auth/login` sits behind the
//! Bearer-token authentication layer.

use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::security::{auth, authentication_middleware};
use crate::shared::state::AppState;

pub fn configure_api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(crate::directory::configure_directory_routes())
        .merge(crate::matrices::configure_matrix_routes())
        .merge(crate::cycles::configure_cycle_routes())
        .merge(crate::evaluations::configure_evaluation_routes())
        .merge(crate::reports::configure_report_routes())
        .merge(crate::notifications::configure_notification_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(auth::configure_auth_routes())
        .merge(protected)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
