use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update. An absent field is left untouched; an explicit `null`
/// clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdateRequest {
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 200, message = "full_name is too long"))]
    #[schema(value_type = Option<String>, example = "Ada Lovelace")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(url(message = "avatar_url must be a valid URL"))]
    #[schema(value_type = Option<String>)]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 32, message = "phone is too long"))]
    #[schema(value_type = Option<String>, example = "+44 20 7946 0000")]
    pub phone: Option<Option<String>>,
}

// Runs only for keys present in the body, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ProfileUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none() && self.phone.is_none()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(full_name) = self.full_name.as_ref() {
            profile.full_name = full_name.clone();
        }
        if let Some(avatar_url) = self.avatar_url.as_ref() {
            profile.avatar_url = avatar_url.clone();
        }
        if let Some(phone) = self.phone.as_ref() {
            profile.phone = phone.clone();
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfilesResponse {
    pub profiles: Vec<Profile>,
}
