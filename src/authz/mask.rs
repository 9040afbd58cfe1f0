use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::errors::AppError;

bitflags! {
    /// CRUD capabilities on a page, stored as a small integer in `[0, 15]`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermMask: u8 {
        const CREATE = 0b0001;
        const READ   = 0b0010;
        const UPDATE = 0b0100;
        const DELETE = 0b1000;
    }
}

impl PermMask {
    pub const NONE: PermMask = PermMask::empty();
    pub const FULL: PermMask = PermMask::all();

    /// True iff every bit of `required` is also set in `self`.
    pub fn has(self, required: PermMask) -> bool {
        (self & required) == required
    }

    /// Parses a stored integer, rejecting anything outside `[0, 15]`.
    pub fn from_raw(raw: i64) -> Result<Self, AppError> {
        u8::try_from(raw)
            .ok()
            .and_then(PermMask::from_bits)
            .ok_or_else(|| AppError::invalid_input(format!("perms_mask out of range: {raw}")))
    }

    pub fn to_raw(self) -> i64 {
        i64::from(self.bits())
    }
}

impl Serialize for PermMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for PermMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        PermMask::from_bits(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("perms_mask out of range: {raw}")))
    }
}

/// Access level exposed at the administration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Removes the row; no capabilities from this source.
    None,
    View,
    Admin,
}

impl Level {
    /// `None` means "no row", which is distinct from a stored zero mask.
    pub fn mask(self) -> Option<PermMask> {
        match self {
            Level::None => None,
            Level::View => Some(PermMask::READ),
            Level::Admin => Some(PermMask::FULL),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::None => "none",
            Level::View => "view",
            Level::Admin => "admin",
        }
    }
}
