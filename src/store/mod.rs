//! Storage access capability.
//!
//! Everything the resolver and the administration workflows need from the
//! relational store goes through [`Store`], so the production SQLite backend
//! and the in-memory fake are interchangeable.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::PermMask;
use crate::errors::AppResult;
use crate::models::profile::{Profile, ProfileUpdateRequest};
use crate::models::rbac::{EffectivePagePerm, Page, Role, RolePagePerm};

/// A role default joined with the page it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePagePermRow {
    pub role_id: i64,
    pub page: Page,
    pub perms_mask: PermMask,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    // Roles and pages
    async fn list_roles(&self) -> AppResult<Vec<Role>>;
    async fn find_role(&self, slug: &str) -> AppResult<Option<Role>>;
    async fn insert_role(&self, slug: &str, label: &str) -> AppResult<Role>;
    async fn list_pages(&self) -> AppResult<Vec<Page>>;
    /// Pages whose slug is in `slugs`; unknown slugs are simply absent.
    async fn find_pages(&self, slugs: &[String]) -> AppResult<Vec<Page>>;

    // Role defaults
    async fn list_role_page_perms(&self) -> AppResult<Vec<RolePagePermRow>>;
    async fn role_page_perms_for(&self, role_id: i64) -> AppResult<Vec<RolePagePerm>>;
    /// Upserts and removes role defaults for one role as a single unit.
    async fn apply_role_page_perms(&self, role_id: i64, upserts: &[RolePagePerm], removals: &[i64]) -> AppResult<()>;

    // User roles
    async fn user_role(&self, user_id: Uuid) -> AppResult<Option<Role>>;
    async fn list_user_roles(&self) -> AppResult<Vec<(Uuid, Role)>>;
    async fn upsert_user_role(&self, user_id: Uuid, role_id: i64) -> AppResult<()>;

    // Per-user overrides
    async fn upsert_user_page_perm(&self, user_id: Uuid, page_id: i64, mask: PermMask) -> AppResult<()>;
    async fn delete_user_page_perm(&self, user_id: Uuid, page_id: i64) -> AppResult<()>;
    async fn clear_user_page_perms(&self, user_id: Uuid) -> AppResult<u64>;
    async fn insert_user_page_perms(&self, user_id: Uuid, rows: &[(i64, PermMask)]) -> AppResult<u64>;

    // Effective permissions
    /// `None` when neither an override nor a role default exists.
    async fn effective_mask(&self, user_id: Uuid, page_slug: &str) -> AppResult<Option<PermMask>>;
    async fn effective_pages(&self, user_id: Uuid) -> AppResult<Vec<EffectivePagePerm>>;

    // Profiles
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    async fn update_profile(&self, user_id: Uuid, changes: &ProfileUpdateRequest) -> AppResult<Option<Profile>>;
    async fn list_profiles(&self) -> AppResult<Vec<Profile>>;
}
