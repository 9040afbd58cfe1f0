use std::marker::PhantomData;
use std::ops::Deref;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::{pages, EffectivePermissionResolver, PermMask};
use crate::app::AppState;
use crate::errors::AppError;
use crate::identity::Identity;
use crate::jwt::AuthUser;

/// Why a request was not allowed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
    ResolutionFailed(String),
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AppError::unauthenticated("Unauthenticated"),
            Denial::Forbidden => AppError::forbidden("Forbidden"),
            Denial::ResolutionFailed(reason) => AppError::resolution_failed(reason),
        }
    }
}

/// Allows the caller through iff their effective mask on `page` covers `required`.
///
/// Returns the resolved mask on success. A store failure is never treated as
/// an allow.
pub async fn authorize(
    resolver: &EffectivePermissionResolver,
    identity: Option<&Identity>,
    page: &str,
    required: PermMask,
) -> Result<PermMask, Denial> {
    let identity = identity.ok_or(Denial::Unauthenticated)?;

    let mask = match resolver.resolve(identity.user_id, page).await {
        Ok(mask) => mask,
        Err(err) => {
            tracing::warn!(user_id = %identity.user_id, page, error = %err, "permission resolution failed");
            return Err(Denial::ResolutionFailed(err.to_string()));
        }
    };

    if !mask.has(required) {
        tracing::debug!(
            user_id = %identity.user_id,
            page,
            required = required.bits(),
            mask = mask.bits(),
            "permission denied"
        );
        return Err(Denial::Forbidden);
    }

    Ok(mask)
}

/// A (page, capability) pair a route demands, declared at the type level.
pub trait PageRequirement: Send + Sync + 'static {
    const PAGE: &'static str;
    const REQUIRED: PermMask;
}

pub struct SettingsRead;
pub struct SettingsUpdate;
pub struct UsersRead;
pub struct UsersUpdate;

impl PageRequirement for SettingsRead {
    const PAGE: &'static str = pages::SETTINGS;
    const REQUIRED: PermMask = PermMask::READ;
}

impl PageRequirement for SettingsUpdate {
    const PAGE: &'static str = pages::SETTINGS;
    const REQUIRED: PermMask = PermMask::UPDATE;
}

impl PageRequirement for UsersRead {
    const PAGE: &'static str = pages::USERS;
    const REQUIRED: PermMask = PermMask::READ;
}

impl PageRequirement for UsersUpdate {
    const PAGE: &'static str = pages::USERS;
    const REQUIRED: PermMask = PermMask::UPDATE;
}

/// Extractor for routes gated on a page capability.
///
/// Authenticates the bearer token first, then runs [`authorize`] against `R`.
pub struct Authorized<R: PageRequirement> {
    pub identity: Identity,
    pub mask: PermMask,
    _requirement: PhantomData<fn() -> R>,
}

impl<R: PageRequirement> Deref for Authorized<R> {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.identity
    }
}

#[async_trait]
impl<R: PageRequirement> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        let mask = authorize(&state.resolver(), Some(&identity), R::PAGE, R::REQUIRED).await?;

        Ok(Authorized {
            identity,
            mask,
            _requirement: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use uuid::Uuid;

    use super::*;
    use crate::store::{MemoryStore, Store};

    async fn with_role(role: &str) -> (Arc<MemoryStore>, Identity) {
        let store = Arc::new(MemoryStore::seeded());
        let identity = Identity::new(Uuid::new_v4());
        let role = store.find_role(role).await.unwrap().unwrap();
        store.upsert_user_role(identity.user_id, role.id).await.unwrap();
        (store, identity)
    }

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() {
        let resolver = EffectivePermissionResolver::new(Arc::new(MemoryStore::seeded()));
        let denial = authorize(&resolver, None, pages::REPORTS, PermMask::READ).await.unwrap_err();
        assert_eq!(denial, Denial::Unauthenticated);
    }

    #[tokio::test]
    async fn viewer_can_read_reports_but_not_update_users() {
        let (store, identity) = with_role("viewer").await;
        let resolver = EffectivePermissionResolver::new(store);

        let mask = authorize(&resolver, Some(&identity), pages::REPORTS, PermMask::READ).await.unwrap();
        assert_eq!(mask, PermMask::READ);

        let denial = authorize(&resolver, Some(&identity), pages::USERS, PermMask::UPDATE).await.unwrap_err();
        assert_eq!(denial, Denial::Forbidden);
    }

    #[tokio::test]
    async fn read_grant_does_not_imply_other_bits() {
        let (store, identity) = with_role("viewer").await;
        let resolver = EffectivePermissionResolver::new(store);

        for required in [PermMask::CREATE, PermMask::UPDATE, PermMask::DELETE, PermMask::READ | PermMask::UPDATE] {
            let outcome = authorize(&resolver, Some(&identity), pages::REPORTS, required).await;
            assert_eq!(outcome, Err(Denial::Forbidden), "required={required:?}");
        }
    }

    #[tokio::test]
    async fn admin_passes_every_requirement() {
        let (store, identity) = with_role("admin").await;
        let resolver = EffectivePermissionResolver::new(store);

        for page in [pages::DASHBOARD, pages::REPORTS, pages::USERS, pages::SETTINGS] {
            let mask = authorize(&resolver, Some(&identity), page, PermMask::FULL).await.unwrap();
            assert_eq!(mask, PermMask::FULL);
        }
    }

    #[tokio::test]
    async fn store_failure_denies_with_resolution_failed() {
        let (store, identity) = with_role("admin").await;
        store.fail_on("effective_mask");
        let resolver = EffectivePermissionResolver::new(store);

        let denial = authorize(&resolver, Some(&identity), pages::SETTINGS, PermMask::READ).await.unwrap_err();
        assert!(matches!(denial, Denial::ResolutionFailed(_)));
        assert_eq!(AppError::from(denial).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn denials_map_to_opaque_statuses() {
        assert_eq!(AppError::from(Denial::Unauthenticated).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(Denial::Forbidden).status(), StatusCode::FORBIDDEN);
    }
}
