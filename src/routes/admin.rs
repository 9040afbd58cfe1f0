//! Administration API
//!
//! Role, page permission and account management. Every route is gated on a
//! capability of the `settings` or `users` page.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{Authorized, SettingsRead, SettingsUpdate, UsersRead};
use crate::errors::AppResult;
use crate::models::rbac::*;
use crate::models::user::{CreateUserRequest, CreateUserResponse, UsersResponse};
use crate::routes::profile;
use crate::validation::ValidatedJson;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/create-user", post(create_user))
        .route("/users", get(list_users))
        .route("/assign-admin", post(assign_admin))
        .route("/update-user-role", post(update_user_role))
        .route("/set-user-page", post(set_user_page))
        // Roles and pages
        .route("/create-role", post(create_role))
        .route("/roles", get(list_roles))
        .route("/pages", get(list_pages))
        .route("/set-role-page", post(set_role_page))
        .route("/set-role-pages", post(set_role_pages))
        .merge(profile::admin_routes())
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Create an account, optionally with a role
#[utoipa::path(
    post,
    path = "/admin/create-user",
    tag = "Admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Invalid input or unknown role"),
        (status = 403, description = "Requires settings:UPDATE"),
        (status = 409, description = "Email already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let resp = state.admin().create_user(state.identity.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// List accounts with their role
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    responses(
        (status = 200, description = "Accounts and roles", body = UsersResponse),
        (status = 403, description = "Requires users:READ"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, _auth: Authorized<UsersRead>) -> AppResult<Json<UsersResponse>> {
    Ok(Json(state.admin().list_users(state.identity.as_ref()).await?))
}

/// Give a user the `admin` role
#[utoipa::path(
    post,
    path = "/admin/assign-admin",
    tag = "Admin",
    request_body = AssignAdminRequest,
    responses(
        (status = 200, description = "Admin role assigned", body = RoleAssignmentResponse),
        (status = 400, description = "Invalid user_id or admin role missing"),
        (status = 403, description = "Requires settings:UPDATE"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_admin(
    State(state): State<AppState>,
    auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<AssignAdminRequest>,
) -> AppResult<Json<RoleAssignmentResponse>> {
    tracing::info!(actor = %auth.user_id, target = %req.user_id, "assigning admin role");
    Ok(Json(state.admin().assign_admin(req).await?))
}

/// Change a user's role and re-materialize their page permissions
#[utoipa::path(
    post,
    path = "/admin/update-user-role",
    tag = "Admin",
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleAssignmentResponse),
        (status = 400, description = "Invalid user_id or unknown role"),
        (status = 403, description = "Requires settings:UPDATE"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<UpdateUserRoleRequest>,
) -> AppResult<Json<RoleAssignmentResponse>> {
    Ok(Json(state.admin().update_user_role(req).await?))
}

/// Set or remove a per-user page override
#[utoipa::path(
    post,
    path = "/admin/set-user-page",
    tag = "Admin",
    request_body = SetUserPageRequest,
    responses(
        (status = 200, description = "Override applied", body = SetLevelResponse),
        (status = 400, description = "Invalid user_id or page_slug"),
        (status = 403, description = "Requires settings:UPDATE"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_user_page(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<SetUserPageRequest>,
) -> AppResult<Json<SetLevelResponse>> {
    Ok(Json(state.admin().set_user_page(req).await?))
}

// =============================================================================
// ROLES AND PAGES
// =============================================================================

/// Create a role, optionally seeding its page defaults
#[utoipa::path(
    post,
    path = "/admin/create-role",
    tag = "Admin",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = CreateRoleResponse),
        (status = 400, description = "Invalid slug or permissions"),
        (status = 403, description = "Requires settings:UPDATE"),
        (status = 409, description = "Role slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<CreateRoleResponse>)> {
    let resp = state.admin().create_role(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// List roles with their page defaults
#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "Admin",
    responses(
        (status = 200, description = "Roles and permissions", body = RolesResponse),
        (status = 403, description = "Requires settings:READ"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, _auth: Authorized<SettingsRead>) -> AppResult<Json<RolesResponse>> {
    Ok(Json(state.admin().list_roles_with_permissions().await?))
}

/// List protected pages
#[utoipa::path(
    get,
    path = "/admin/pages",
    tag = "Admin",
    responses(
        (status = 200, description = "All pages", body = PagesResponse),
        (status = 403, description = "Requires settings:READ"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_pages(State(state): State<AppState>, _auth: Authorized<SettingsRead>) -> AppResult<Json<PagesResponse>> {
    Ok(Json(state.admin().list_pages().await?))
}

/// Set or remove one role default
#[utoipa::path(
    post,
    path = "/admin/set-role-page",
    tag = "Admin",
    request_body = SetRolePageRequest,
    responses(
        (status = 200, description = "Role default applied", body = SetLevelResponse),
        (status = 400, description = "Unknown role or page"),
        (status = 403, description = "Requires settings:UPDATE"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_role_page(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<SetRolePageRequest>,
) -> AppResult<Json<SetLevelResponse>> {
    Ok(Json(state.admin().set_role_page(req).await?))
}

/// Apply several role defaults at once; any unknown page rejects the batch
#[utoipa::path(
    post,
    path = "/admin/set-role-pages",
    tag = "Admin",
    request_body = SetRolePagesRequest,
    responses(
        (status = 200, description = "Role defaults applied", body = SetRolePagesResponse),
        (status = 400, description = "Unknown role or page slug"),
        (status = 403, description = "Requires settings:UPDATE"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_role_pages(
    State(state): State<AppState>,
    _auth: Authorized<SettingsUpdate>,
    ValidatedJson(req): ValidatedJson<SetRolePagesRequest>,
) -> AppResult<Json<SetRolePagesResponse>> {
    Ok(Json(state.admin().set_role_pages(req).await?))
}
