use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub db_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // Lightweight store check; the process stays healthy either way
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse { ok: true, db_ok: true, db_error: None }),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the store");
            let db_error = (!state.config.mode.is_production()).then(|| e.to_string());
            Json(HealthResponse { ok: true, db_ok: false, db_error })
        }
    }
}
