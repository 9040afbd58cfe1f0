use serde_json::Value;

#[test]
fn openapi_documents_every_route_with_bearer_security() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = pagegate::docs::build_openapi(8081)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");

    let expected = [
        ("/health", "get"),
        ("/pages/my-pages", "get"),
        ("/roles/userrole", "get"),
        ("/profile/me", "get"),
        ("/profile/me", "put"),
        ("/admin/create-user", "post"),
        ("/admin/create-role", "post"),
        ("/admin/set-user-page", "post"),
        ("/admin/assign-admin", "post"),
        ("/admin/set-role-pages", "post"),
        ("/admin/set-role-page", "post"),
        ("/admin/roles", "get"),
        ("/admin/pages", "get"),
        ("/admin/users", "get"),
        ("/admin/update-user-role", "post"),
        ("/admin/profile/{user_id}", "get"),
        ("/admin/profile/{user_id}", "put"),
        ("/admin/profiles", "get"),
    ];
    for (path, method) in expected {
        assert!(
            paths.get(path).and_then(|p| p.get(method)).is_some(),
            "OpenAPI missing {} {}",
            method,
            path
        );
    }

    let scheme = &v["components"]["securitySchemes"]["bearerAuth"];
    assert_eq!(scheme["scheme"], "bearer");

    Ok(())
}

#[test]
fn perms_mask_is_documented_as_an_integer() -> anyhow::Result<()> {
    let doc = pagegate::docs::build_openapi(8081)?;
    let v = serde_json::to_value(&doc)?;

    let mask = &v["components"]["schemas"]["EffectivePagePerm"]["properties"]["perms_mask"];
    assert_eq!(mask["type"], "integer", "unexpected perms_mask schema: {}", mask);

    let level = &v["components"]["schemas"]["Level"];
    let values: Vec<&str> = level["enum"]
        .as_array()
        .expect("Level must be an enum")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(values, vec!["none", "view", "admin"]);

    Ok(())
}
