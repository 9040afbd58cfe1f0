use std::sync::OnceLock;

use crate::errors::AppError;

const DEFAULT_PORT: u16 = 8081;
const DEFAULT_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024;
const DEFAULT_JWT_EXP_HOURS: i64 = 24;

/// Process-wide settings, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_exp_hours: i64,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub mode: RuntimeMode,
}

impl AppConfig {
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_exp_hours: DEFAULT_JWT_EXP_HOURS,
            port: DEFAULT_PORT,
            allowed_origins: split_origins(DEFAULT_ORIGINS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            mode: RuntimeMode::Development,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let database_url = require_env("DATABASE_URL")?;
        let jwt_secret = require_env("JWT_SECRET")?;

        let mut config = Self::new(database_url, jwt_secret);
        config.mode = RuntimeMode::current();

        if let Some(hours) = parse_env::<i64>("JWT_EXP_HOURS")? {
            config.jwt_exp_hours = hours;
        }
        if let Some(port) = parse_env::<u16>("APP_PORT")? {
            config.port = port;
        }
        if let Some(limit) = parse_env::<usize>("MAX_BODY_BYTES")? {
            config.max_body_bytes = limit;
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            config.allowed_origins = split_origins(&origins);
        }

        Ok(config)
    }
}

/// Deployment mode. Production hides internal error details from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    pub fn current() -> Self {
        static MODE: OnceLock<RuntimeMode> = OnceLock::new();
        *MODE.get_or_init(|| Self::parse(&std::env::var("APP_ENV").unwrap_or_default()))
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => RuntimeMode::Production,
            _ => RuntimeMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }
}

fn require_env(key: &str) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::configuration(format!("{key} not set"))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::configuration(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
