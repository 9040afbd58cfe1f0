use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::pages::my_pages,
		routes::roles::user_roles,
		routes::profile::get_my_profile,
		routes::profile::update_my_profile,
		routes::profile::get_user_profile,
		routes::profile::update_user_profile,
		routes::profile::list_profiles,
		routes::admin::create_user,
		routes::admin::list_users,
		routes::admin::assign_admin,
		routes::admin::update_user_role,
		routes::admin::set_user_page,
		routes::admin::create_role,
		routes::admin::list_roles,
		routes::admin::list_pages,
		routes::admin::set_role_page,
		routes::admin::set_role_pages
	),
	components(
		schemas(
			routes::health::HealthResponse,
			crate::authz::Level,
			models::rbac::Role,
			models::rbac::Page,
			models::rbac::EffectivePagePerm,
			models::rbac::RolePermissionEntry,
			models::rbac::RoleWithPermissions,
			models::rbac::RolesResponse,
			models::rbac::RolePageSummary,
			models::rbac::RoleOverview,
			models::rbac::RoleOverviewResponse,
			models::rbac::PagesResponse,
			models::rbac::MyPagesResponse,
			models::rbac::PagePermissionInput,
			models::rbac::CreateRoleRequest,
			models::rbac::CreateRoleResponse,
			models::rbac::SetUserPageRequest,
			models::rbac::SetRolePageRequest,
			models::rbac::SetRolePagesRequest,
			models::rbac::SetLevelResponse,
			models::rbac::RolePageDetail,
			models::rbac::SetRolePagesResponse,
			models::rbac::AssignAdminRequest,
			models::rbac::UpdateUserRoleRequest,
			models::rbac::RoleAssignmentResponse,
			models::user::AccountRecord,
			models::user::CreateUserRequest,
			models::user::CreateUserResponse,
			models::user::UserSummary,
			models::user::UsersResponse,
			models::profile::Profile,
			models::profile::ProfileUpdateRequest,
			models::profile::ProfileResponse,
			models::profile::ProfilesResponse
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Health", description = "Liveness and store reachability"),
		(name = "Pages", description = "Caller's effective page permissions"),
		(name = "Roles", description = "Role overview for signed-in users"),
		(name = "Profiles", description = "User profiles"),
		(name = "Admin", description = "Role, permission and account administration")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
			);
		}
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	add_error_envelope(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let json_route = get(move || {
		let doc = doc.clone();
		async move { Json(doc) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

/// Registers the shared error body and attaches it to every 4xx/5xx response.
fn add_error_envelope(doc: &mut Value) {
	if let Some(schemas) = doc.pointer_mut("/components/schemas").and_then(Value::as_object_mut) {
		schemas.insert(
			"ErrorResponse".to_string(),
			json!({
				"type": "object",
				"required": ["error", "code"],
				"properties": {
					"error": {"type": "string"},
					"code": {"type": "string", "example": "AUTHZ_2001"},
					"details": {"type": "object"}
				}
			}),
		);
	}

	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else {
		return;
	};

	for item in paths.values_mut() {
		let Some(ops) = item.as_object_mut() else {
			continue;
		};
		for op in ops.values_mut() {
			let Some(responses) = op.get_mut("responses").and_then(Value::as_object_mut) else {
				continue;
			};
			for (status, response) in responses.iter_mut() {
				let is_error = status.starts_with('4') || status.starts_with('5');
				if is_error && response.get("content").is_none() {
					response["content"] = json!({
						"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}
					});
				}
			}
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
