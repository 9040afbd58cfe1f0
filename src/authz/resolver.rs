use std::sync::Arc;

use uuid::Uuid;

use super::PermMask;
use crate::errors::AppResult;
use crate::models::rbac::EffectivePagePerm;
use crate::store::Store;

/// Precedence rule for one (user, page) pair.
///
/// An override row replaces the role default outright, even when its mask is
/// zero. With neither row present the user has no capabilities.
pub fn resolve_mask(user_override: Option<PermMask>, role_default: Option<PermMask>) -> PermMask {
    match (user_override, role_default) {
        (Some(mask), _) => mask,
        (None, Some(mask)) => mask,
        (None, None) => PermMask::NONE,
    }
}

/// Computes the mask actually enforced for a user on a page.
#[derive(Clone)]
pub struct EffectivePermissionResolver {
    store: Arc<dyn Store>,
}

impl EffectivePermissionResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Unknown pages resolve to an empty mask rather than an error.
    pub async fn resolve(&self, user_id: Uuid, page_slug: &str) -> AppResult<PermMask> {
        let mask = self.store.effective_mask(user_id, page_slug).await?;
        Ok(mask.unwrap_or(PermMask::NONE))
    }

    pub async fn my_pages(&self, user_id: Uuid) -> AppResult<Vec<EffectivePagePerm>> {
        self.store.effective_pages(user_id).await
    }
}
