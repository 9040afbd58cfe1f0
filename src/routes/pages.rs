use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::rbac::MyPagesResponse;

pub fn routes() -> Router<AppState> {
    Router::new().route("/my-pages", get(my_pages))
}

/// Effective permissions of the caller, one entry per page with a resolved mask
#[utoipa::path(
    get,
    path = "/pages/my-pages",
    tag = "Pages",
    responses(
        (status = 200, description = "Caller's effective page permissions", body = MyPagesResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_pages(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MyPagesResponse>> {
    let pages = state.resolver().my_pages(auth.user_id).await?;
    Ok(Json(MyPagesResponse { pages }))
}
