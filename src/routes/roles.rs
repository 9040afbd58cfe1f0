use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::rbac::RoleOverviewResponse;

pub fn routes() -> Router<AppState> {
    Router::new().route("/userrole", get(user_roles))
}

/// All roles with their page defaults, for any signed-in user
#[utoipa::path(
    get,
    path = "/roles/userrole",
    tag = "Roles",
    responses(
        (status = 200, description = "Roles and their page permissions", body = RoleOverviewResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn user_roles(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<RoleOverviewResponse>> {
    Ok(Json(state.admin().role_overview().await?))
}
