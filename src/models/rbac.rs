use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::authz::{Level, PermMask};

// =============================================================================
// ROLE / PAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: i64,
    #[schema(example = "viewer")]
    pub slug: String,
    #[schema(example = "Viewer")]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub id: i64,
    #[schema(example = "reports")]
    pub slug: String,
    #[schema(example = "Reports")]
    pub label: String,
}

// =============================================================================
// MASK ROWS
// =============================================================================

/// Role default for one page. One row per (role, page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePagePerm {
    pub role_id: i64,
    pub page_id: i64,
    pub perms_mask: PermMask,
}

/// Resolved mask for one of the caller's pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EffectivePagePerm {
    pub page_slug: String,
    #[schema(value_type = u8, example = 2)]
    pub perms_mask: PermMask,
}

// =============================================================================
// LISTINGS
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RolePermissionEntry {
    pub page_slug: String,
    pub page_label: String,
    #[schema(value_type = u8, example = 15)]
    pub perms_mask: PermMask,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    pub id: i64,
    pub slug: String,
    pub label: String,
    pub permissions: Vec<RolePermissionEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolesResponse {
    pub roles: Vec<RoleWithPermissions>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RolePageSummary {
    pub page_slug: String,
    #[schema(value_type = u8)]
    pub perms_mask: PermMask,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleOverview {
    pub id: i64,
    pub slug: String,
    pub label: String,
    pub page_permissions: Vec<RolePageSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleOverviewResponse {
    pub roles: Vec<RoleOverview>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PagesResponse {
    pub pages: Vec<Page>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyPagesResponse {
    pub pages: Vec<EffectivePagePerm>,
}

// =============================================================================
// ADMINISTRATION REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PagePermissionInput {
    #[schema(example = "reports")]
    pub page_slug: String,
    pub level: Level,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, message = "Valid slug is required"))]
    #[schema(example = "auditor")]
    pub slug: String,
    #[validate(length(min = 1, message = "Valid label is required"))]
    #[schema(example = "Auditor")]
    pub label: String,
    #[serde(default)]
    pub permissions: Option<Vec<PagePermissionInput>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetUserPageRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Invalid page_slug"))]
    pub page_slug: String,
    pub level: Level,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetRolePageRequest {
    #[validate(length(min = 1, message = "Invalid role_slug"))]
    pub role_slug: String,
    #[validate(length(min = 1, message = "Invalid page_slug"))]
    pub page_slug: String,
    pub level: Level,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetRolePagesRequest {
    #[validate(length(min = 1, message = "Invalid role_slug"))]
    pub role_slug: String,
    #[validate(length(min = 1, message = "permissions must be a non-empty array"))]
    pub permissions: Vec<PagePermissionInput>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignAdminRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRoleRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Invalid role_slug"))]
    pub role_slug: String,
}

// =============================================================================
// ADMINISTRATION RESPONSES
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoleResponse {
    pub role: Role,
    pub permissions_assigned: usize,
    pub permissions: Vec<PagePermissionInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetLevelResponse {
    pub ok: bool,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u8>)]
    pub perms_mask: Option<PermMask>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolePageDetail {
    pub page_slug: String,
    pub level: Level,
    #[schema(value_type = u8)]
    pub perms_mask: PermMask,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetRolePagesResponse {
    pub ok: bool,
    pub role_slug: String,
    pub permissions_set: usize,
    pub permissions_removed: usize,
    pub details: Vec<RolePageDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleAssignmentResponse {
    pub ok: bool,
    pub user_id: Uuid,
    pub role_slug: String,
    pub permissions_copied: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
