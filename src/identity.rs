//! Identity collaborator: bearer token verification and account records.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::account_from_row;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::models::user::AccountRecord;
use crate::utils::{hash_password, utc_now};

const ACCOUNT_COLUMNS: &str = "id, email, email_confirmed, created_at, last_sign_in_at";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, email: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> AppResult<Identity>;
    async fn create_user(&self, email: &str, password: &str, email_confirm: bool) -> AppResult<AccountRecord>;
    async fn list_users(&self) -> AppResult<Vec<AccountRecord>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>>;
}

/// HS256 tokens checked against accounts kept in `auth_users`.
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    pool: SqlitePool,
    jwt: JwtConfig,
}

impl LocalIdentityProvider {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self { pool, jwt }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_token(&self, token: &str) -> AppResult<Identity> {
        let claims = self.jwt.decode(token)?;

        let email: Option<String> = sqlx::query_scalar("SELECT email FROM auth_users WHERE id = ?")
            .bind(claims.sub.to_string())
            .fetch_optional(&self.pool)
            .await?;

        // A well-signed token for a deleted account is still rejected.
        let email = email.ok_or_else(|| AppError::invalid_token("Invalid token"))?;

        Ok(Identity::new(claims.sub).with_email(email))
    }

    async fn create_user(&self, email: &str, password: &str, email_confirm: bool) -> AppResult<AccountRecord> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::invalid_email("Valid email is required"));
        }
        let password_hash = hash_password(password)?;

        let id = Uuid::new_v4();
        let now = utc_now();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO auth_users (id, email, password_hash, email_confirmed, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&email)
        .bind(&password_hash)
        .bind(email_confirm as i64)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            let err = AppError::from(err);
            if err.is_unique_violation() {
                return Err(AppError::already_exists("Email already exists"));
            }
            return Err(err);
        }

        sqlx::query("INSERT INTO profiles (id, updated_at) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, "account created");

        Ok(AccountRecord {
            id,
            email,
            email_confirmed: email_confirm,
            created_at: now,
            last_sign_in_at: None,
        })
    }

    async fn list_users(&self) -> AppResult<Vec<AccountRecord>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM auth_users ORDER BY created_at");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(account_from_row).collect()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM auth_users WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }
}
