use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Authorized, UsersRead, UsersUpdate};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::profile::{ProfileResponse, ProfileUpdateRequest, ProfilesResponse};
use crate::validation::{parse_user_id, ValidatedJson};

/// Routes for the caller's own profile, mounted at `/profile`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(get_my_profile).put(update_my_profile))
}

/// Profile administration, mounted under `/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/:user_id", get(get_user_profile).put(update_user_profile))
        .route("/profiles", get(list_profiles))
}

async fn load_profile(state: &AppState, user_id: Uuid) -> AppResult<ProfileResponse> {
    let profile = state
        .store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;
    Ok(ProfileResponse { profile })
}

async fn apply_update(state: &AppState, user_id: Uuid, changes: ProfileUpdateRequest) -> AppResult<ProfileResponse> {
    if changes.is_empty() {
        return Err(AppError::invalid_input("No fields to update"));
    }

    let profile = state
        .store
        .update_profile(user_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    tracing::info!(user_id = %user_id, "profile updated");
    Ok(ProfileResponse { profile })
}

#[utoipa::path(
    get,
    path = "/profile/me",
    tag = "Profiles",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Profile not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_my_profile(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ProfileResponse>> {
    Ok(Json(load_profile(&state, auth.user_id).await?))
}

#[utoipa::path(
    put,
    path = "/profile/me",
    tag = "Profiles",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "No fields to update"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(changes): ValidatedJson<ProfileUpdateRequest>,
) -> AppResult<Json<ProfileResponse>> {
    Ok(Json(apply_update(&state, auth.user_id, changes).await?))
}

#[utoipa::path(
    get,
    path = "/admin/profile/{user_id}",
    tag = "Profiles",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's profile", body = ProfileResponse),
        (status = 400, description = "Invalid user_id format"),
        (status = 403, description = "Requires users:READ"),
        (status = 404, description = "Profile not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_profile(
    State(state): State<AppState>,
    _auth: Authorized<UsersRead>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(load_profile(&state, user_id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/profile/{user_id}",
    tag = "Profiles",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Requires users:UPDATE"),
        (status = 404, description = "Profile not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user_profile(
    State(state): State<AppState>,
    auth: Authorized<UsersUpdate>,
    Path(user_id): Path<String>,
    ValidatedJson(changes): ValidatedJson<ProfileUpdateRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user_id = parse_user_id(&user_id)?;
    tracing::debug!(admin_id = %auth.user_id, user_id = %user_id, "admin profile update");
    Ok(Json(apply_update(&state, user_id, changes).await?))
}

#[utoipa::path(
    get,
    path = "/admin/profiles",
    tag = "Profiles",
    responses(
        (status = 200, description = "All profiles", body = ProfilesResponse),
        (status = 403, description = "Requires users:READ"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_profiles(State(state): State<AppState>, _auth: Authorized<UsersRead>) -> AppResult<Json<ProfilesResponse>> {
    let profiles = state.store.list_profiles().await?;
    Ok(Json(ProfilesResponse { profiles }))
}
