use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::identity::Identity;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes().to_vec(), config.jwt_exp_hours)
    }

    /// Mints a token for `user_id`. Used by the operator CLI and tests only.
    pub fn encode(&self, user_id: Uuid, email: Option<&str>) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            email: email.map(str::to_string),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                AppError::invalid_token("Invalid token")
            })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// Caller whose bearer token was verified by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl Deref for AuthUser {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::missing_token("Missing token"))?;

        let identity = state.identity.verify_token(token).await?;
        Ok(AuthUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;

    #[test]
    fn encoded_tokens_decode_with_the_same_secret() {
        let jwt = JwtConfig::new("test-secret", 1);
        let user_id = Uuid::new_v4();
        let token = jwt.encode(user_id, Some("ada@example.com")).unwrap();

        let claims = jwt.decode(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn foreign_and_expired_tokens_are_invalid() {
        let jwt = JwtConfig::new("test-secret", 1);
        let other = JwtConfig::new("other-secret", 1);
        let token = other.encode(Uuid::new_v4(), None).unwrap();
        assert_eq!(jwt.decode(&token).unwrap_err().code(), codes::INVALID_TOKEN);

        let expired = JwtConfig::new("test-secret", -2).encode(Uuid::new_v4(), None).unwrap();
        assert_eq!(jwt.decode(&expired).unwrap_err().code(), codes::INVALID_TOKEN);

        assert!(jwt.decode("not-a-token").is_err());
    }
}
