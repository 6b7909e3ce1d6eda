use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tracing::warn;

use super::{AppState, routes};

pub(crate) fn routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .merge(routes::router(state.clone()))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

/// Healthy only while the database answers.
async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthzResponse>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthzResponse { status: "ok" })),
        Err(err) => {
            warn!(error = %err, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthzResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}
