//! Request body and identifier validation at the HTTP boundary.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::errors::{AppError, AppResult};

/// JSON body that is deserialized with path-aware errors and then validated.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(body_error)?;

        let value = parse_json::<T>(&bytes)?;
        value.validate().map_err(validation_error)?;

        Ok(ValidatedJson(value))
    }
}

fn body_error(rejection: BytesRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::payload_too_large("Request body too large");
    }
    AppError::invalid_input(format!("Failed to read request body: {}", rejection.body_text()))
}

pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<T> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        AppError::invalid_input_with("Invalid request body", json!({ "path": path, "reason": err.inner().to_string() }))
    })
}

fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields = Map::new();
    let mut first_message = None;

    for (field, errs) in errors.field_errors() {
        let messages: Vec<Value> = errs
            .iter()
            .map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                if first_message.is_none() {
                    first_message = Some(message.clone());
                }
                Value::String(message)
            })
            .collect();
        fields.insert(field.to_string(), Value::Array(messages));
    }

    let message = first_message.unwrap_or_else(|| "Invalid input".to_string());
    AppError::invalid_input_with(message, Value::Object(fields))
}

/// Only the 36-character hyphenated form is accepted.
pub fn parse_user_id(raw: &str) -> AppResult<Uuid> {
    let raw = raw.trim();
    if raw.len() != 36 {
        return Err(AppError::invalid_uuid("Invalid user_id format"));
    }
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_uuid("Invalid user_id format"))
}

/// Slugs are lowercase ASCII letters, digits, `_` and `-`.
pub fn validate_slug(slug: &str, field: &str) -> AppResult<()> {
    let valid = !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(AppError::invalid_slug(format!("Invalid {field}")))
    }
}

pub fn require_non_empty<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing_field(format!("{field} is required")));
    }
    Ok(trimmed)
}
