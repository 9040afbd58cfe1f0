#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use pagegate::admin::AdminService;
use pagegate::config::AppConfig;
use pagegate::create_app;
use pagegate::identity::{IdentityProvider, LocalIdentityProvider};
use pagegate::jwt::JwtConfig;
use pagegate::store::{SqliteStore, Store};

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    pub store: Arc<dyn Store>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Same harness with adjusted settings (runtime mode, body limit, ...).
    pub async fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("test.db");

        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_path())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        let mut config = AppConfig::new(format!("sqlite://{}", db_path.display()), JWT_SECRET);
        configure(&mut config);
        let jwt = JwtConfig::from_config(&config);
        let router = create_app(pool.clone(), config).await?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));

        Ok(Self {
            router,
            pool,
            jwt,
            store,
            _dir: dir,
        })
    }

    pub async fn create_account(&self, email: &str) -> Result<Uuid> {
        let identity = LocalIdentityProvider::new(self.pool.clone(), self.jwt.clone());
        let account = identity.create_user(email, "password123", true).await?;
        Ok(account.id)
    }

    /// Assigns through the materializing workflow, as the admin API does.
    pub async fn assign_role(&self, user_id: Uuid, role_slug: &str) -> Result<()> {
        let role = self
            .store
            .find_role(role_slug)
            .await?
            .with_context(|| format!("role {role_slug} missing"))?;
        AdminService::new(Arc::clone(&self.store)).assign_role(user_id, &role).await?;
        Ok(())
    }

    /// Account with the given role plus a token for it.
    pub async fn user_with_role(&self, email: &str, role_slug: &str) -> Result<(Uuid, String)> {
        let user_id = self.create_account(email).await?;
        self.assign_role(user_id, role_slug).await?;
        let token = self.token(user_id)?;
        Ok((user_id, token))
    }

    pub fn token(&self, user_id: Uuid) -> Result<String> {
        Ok(self.jwt.encode(user_id, None)?)
    }

    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.request("PUT", uri, token, Some(body)).await
    }
}
