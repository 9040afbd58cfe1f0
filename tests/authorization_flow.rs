use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;

use common::TestApp;
use pagegate::store::Store;

#[tokio::test]
async fn viewer_is_forbidden_from_admin_profile_update() -> Result<()> {
    let app = TestApp::new().await?;
    let (viewer_id, viewer_token) = app.user_with_role("viewer@example.com", "viewer").await?;

    let (status, body) = app
        .put(
            &format!("/admin/profile/{}", viewer_id),
            Some(&viewer_token),
            json!({ "full_name": "Escalated" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTHZ_2001");
    assert_eq!(body["error"], "Forbidden");

    Ok(())
}

#[tokio::test]
async fn users_read_grant_opens_read_only_admin_routes() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin_token) = app.user_with_role("admin@example.com", "admin").await?;

    let (status, _) = app
        .post(
            "/admin/set-role-page",
            Some(&admin_token),
            json!({ "role_slug": "viewer", "page_slug": "users", "level": "view" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    // Assigned after the role edit, so the snapshot includes users:READ.
    let (viewer_id, viewer_token) = app.user_with_role("viewer@example.com", "viewer").await?;

    let (status, body) = app.get(&format!("/admin/profile/{}", viewer_id), Some(&viewer_token)).await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["profile"]["id"], viewer_id.to_string());

    let (status, _) = app.get("/admin/profiles", Some(&viewer_token)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .put(
            &format!("/admin/profile/{}", viewer_id),
            Some(&viewer_token),
            json!({ "full_name": "Still read only" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn role_default_applies_to_users_without_overrides() -> Result<()> {
    let app = TestApp::new().await?;
    let user_id = app.create_account("live@example.com").await?;
    let token = app.token(user_id)?;

    // Role row only, no materialized overrides.
    let viewer = app.store.find_role("viewer").await?.expect("seeded viewer role");
    app.store.upsert_user_role(user_id, viewer.id).await?;

    let (status, body) = app.get("/pages/my-pages", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "pages": [
            { "page_slug": "dashboard", "perms_mask": 2 },
            { "page_slug": "reports", "perms_mask": 2 }
        ]})
    );

    let (status, _) = app.get("/admin/users", Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn override_replaces_role_default() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin_token) = app.user_with_role("admin@example.com", "admin").await?;
    let (viewer_id, viewer_token) = app.user_with_role("viewer@example.com", "viewer").await?;

    let (status, body) = app
        .post(
            "/admin/set-user-page",
            Some(&admin_token),
            json!({ "user_id": viewer_id, "page_slug": "settings", "level": "admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "level": "admin", "perms_mask": 15 }));

    let (status, _) = app.get("/admin/roles", Some(&viewer_token)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/admin/set-user-page",
            Some(&admin_token),
            json!({ "user_id": viewer_id, "page_slug": "settings", "level": "none" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "level": "none" }));

    let (status, _) = app.get("/admin/roles", Some(&viewer_token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn authentication_failures_are_401() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.get("/admin/roles", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_1001");

    let (status, body) = app.get("/profile/me", Some("garbage")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_1002");

    // Well-signed token for an account that does not exist.
    let ghost = app.token(Uuid::new_v4())?;
    let (status, _) = app.get("/pages/my-pages", Some(&ghost)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn account_without_role_sees_nothing() -> Result<()> {
    let app = TestApp::new().await?;
    let user_id = app.create_account("plain@example.com").await?;
    let token = app.token(user_id)?;

    let (status, body) = app.get("/pages/my-pages", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "pages": [] }));

    for uri in ["/admin/roles", "/admin/users", "/admin/profiles", "/admin/pages"] {
        let (status, _) = app.get(uri, Some(&token)).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    // Authenticated-only routes stay open.
    let (status, _) = app.get("/roles/userrole", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
