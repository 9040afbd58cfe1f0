use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin::AdminService;
use crate::authz::EffectivePermissionResolver;
use crate::config::AppConfig;
use crate::docs;
use crate::errors::AppError;
use crate::identity::{IdentityProvider, LocalIdentityProvider};
use crate::jwt::JwtConfig;
use crate::routes::{admin, health, pages, profile, roles};
use crate::store::{SqliteStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>, config: AppConfig) -> Self {
        Self {
            store,
            identity,
            config: Arc::new(config),
        }
    }

    /// Production wiring: SQLite store plus locally verified HS256 tokens.
    pub fn from_pool(pool: SqlitePool, config: AppConfig) -> Self {
        let jwt = JwtConfig::from_config(&config);
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let identity = Arc::new(LocalIdentityProvider::new(pool, jwt));
        Self::new(store, identity, config)
    }

    pub fn resolver(&self) -> EffectivePermissionResolver {
        EffectivePermissionResolver::new(Arc::clone(&self.store))
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(Arc::clone(&self.store))
    }
}

pub async fn create_app(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    build_router(AppState::from_pool(pool, config))
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.allowed_origins)?;
    // Enforced by body extractors, so oversized requests get the JSON envelope.
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);
    let openapi = docs::build_openapi(state.config.port).map_err(AppError::from)?;

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/pages", pages::routes())
        .nest("/roles", roles::routes())
        .nest("/profile", profile::routes())
        .nest("/admin", admin::routes())
        .with_state(state)
        .merge(docs::swagger_routes(openapi))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic));

    Ok(router)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| AppError::configuration(format!("invalid CORS origin '{origin}': {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "handler panicked");
    AppError::internal(detail).into_response()
}
