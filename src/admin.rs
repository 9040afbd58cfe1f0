//! Role and permission administration workflows.
//!
//! Multi-step operations are not transactional. Each step commits on its own
//! and a failure after the primary write is reported as a warning next to a
//! successful result instead of being rolled back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use crate::authz::{roles, Level, PermMask};
use crate::errors::{AppError, AppResult};
use crate::identity::IdentityProvider;
use crate::models::rbac::*;
use crate::models::user::{CreateUserRequest, CreateUserResponse, UserSummary, UsersResponse};
use crate::store::Store;
use crate::validation::{parse_user_id, require_non_empty, validate_slug};

/// Result of a workflow whose later steps may have failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    fn complete(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn partial(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warnings: vec![warning.into()],
        }
    }
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn require_role(&self, slug: &str) -> AppResult<Role> {
        self.store
            .find_role(slug)
            .await?
            .ok_or_else(|| AppError::invalid_input(format!("Role \"{slug}\" not found")))
    }

    async fn require_page(&self, slug: &str) -> AppResult<Page> {
        let mut pages = self.store.find_pages(&[slug.to_string()]).await?;
        pages
            .pop()
            .ok_or_else(|| AppError::invalid_input(format!("Page \"{slug}\" not found")))
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// Creates a role and seeds its page defaults.
    ///
    /// The role row is the primary write. Seeding problems come back as a
    /// warning with the role still created.
    pub async fn create_role(&self, req: CreateRoleRequest) -> AppResult<CreateRoleResponse> {
        let slug = req.slug.as_str();
        validate_slug(slug, "slug")?;
        let label = require_non_empty(&req.label, "label")?;

        let permissions = req.permissions.unwrap_or_default();
        for perm in &permissions {
            require_non_empty(&perm.page_slug, "page_slug")?;
            if perm.level == Level::None {
                return Err(AppError::invalid_input("Invalid level \"none\". Must be: view or admin"));
            }
        }

        if self.store.find_role(slug).await?.is_some() {
            return Err(AppError::already_exists(format!("Role with slug \"{slug}\" already exists")));
        }

        let role = match self.store.insert_role(slug, label).await {
            Ok(role) => role,
            Err(err) if err.is_unique_violation() => {
                return Err(AppError::already_exists(format!("Role with slug \"{slug}\" already exists")));
            }
            Err(err) => return Err(err),
        };

        tracing::info!(role = %role.slug, role_id = role.id, "role created");

        let seeded = if permissions.is_empty() {
            Outcome::complete(0)
        } else {
            self.seed_role_permissions(&role, &permissions).await
        };

        Ok(CreateRoleResponse {
            role,
            permissions_assigned: seeded.value,
            permissions,
            warning: seeded.warnings.into_iter().next(),
        })
    }

    async fn seed_role_permissions(&self, role: &Role, permissions: &[PagePermissionInput]) -> Outcome<usize> {
        let slugs: Vec<String> = permissions.iter().map(|p| p.page_slug.clone()).collect();

        let pages = match self.store.find_pages(&slugs).await {
            Ok(pages) => pages,
            Err(err) => {
                tracing::warn!(role = %role.slug, error = %err, "page lookup failed while seeding role");
                return Outcome::partial(0, "Role created but failed to validate pages");
            }
        };

        if pages.is_empty() {
            return Outcome::partial(0, "Role created but no valid pages found");
        }

        let page_ids: HashMap<&str, i64> = pages.iter().map(|p| (p.slug.as_str(), p.id)).collect();
        let invalid: Vec<&str> = slugs
            .iter()
            .map(String::as_str)
            .filter(|slug| !page_ids.contains_key(slug))
            .collect();
        if !invalid.is_empty() {
            return Outcome::partial(0, format!("Role created but some pages are invalid: {}", invalid.join(", ")));
        }

        let mut rows: BTreeMap<i64, PermMask> = BTreeMap::new();
        for perm in permissions {
            if let (Some(page_id), Some(mask)) = (page_ids.get(perm.page_slug.as_str()), perm.level.mask()) {
                rows.insert(*page_id, mask);
            }
        }
        let upserts: Vec<RolePagePerm> = rows
            .into_iter()
            .map(|(page_id, perms_mask)| RolePagePerm {
                role_id: role.id,
                page_id,
                perms_mask,
            })
            .collect();

        match self.store.apply_role_page_perms(role.id, &upserts, &[]).await {
            Ok(()) => Outcome::complete(upserts.len()),
            Err(err) => {
                tracing::warn!(role = %role.slug, error = %err, "failed to seed role permissions");
                Outcome::partial(0, "Role created but failed to assign permissions")
            }
        }
    }

    pub async fn set_role_page(&self, req: SetRolePageRequest) -> AppResult<SetLevelResponse> {
        let role = self.require_role(req.role_slug.trim()).await?;
        let page = self.require_page(req.page_slug.trim()).await?;

        match req.level.mask() {
            None => {
                self.store.apply_role_page_perms(role.id, &[], &[page.id]).await?;
            }
            Some(mask) => {
                let row = RolePagePerm {
                    role_id: role.id,
                    page_id: page.id,
                    perms_mask: mask,
                };
                self.store.apply_role_page_perms(role.id, &[row], &[]).await?;
            }
        }

        tracing::info!(role = %role.slug, page = %page.slug, level = req.level.as_str(), "role page default set");

        Ok(SetLevelResponse {
            ok: true,
            level: req.level,
            perms_mask: req.level.mask(),
        })
    }

    /// Applies a batch of role defaults, all or nothing.
    ///
    /// Every page slug is checked before anything is written; one unknown slug
    /// rejects the whole batch. When a page appears twice the last entry wins.
    pub async fn set_role_pages(&self, req: SetRolePagesRequest) -> AppResult<SetRolePagesResponse> {
        if req.permissions.is_empty() {
            return Err(AppError::invalid_input("permissions must be a non-empty array"));
        }
        for perm in &req.permissions {
            require_non_empty(&perm.page_slug, "page_slug")?;
        }

        let role_slug = req.role_slug.trim().to_string();
        let role = self.require_role(&role_slug).await?;

        let slugs: Vec<String> = req.permissions.iter().map(|p| p.page_slug.clone()).collect();
        let pages = self.store.find_pages(&slugs).await?;
        let page_ids: HashMap<&str, i64> = pages.iter().map(|p| (p.slug.as_str(), p.id)).collect();

        let mut invalid: Vec<&str> = slugs
            .iter()
            .map(String::as_str)
            .filter(|slug| !page_ids.contains_key(slug))
            .collect();
        if !invalid.is_empty() {
            invalid.dedup();
            return Err(AppError::invalid_input(format!("Invalid page slugs: {}", invalid.join(", "))));
        }

        let mut levels: BTreeMap<i64, Level> = BTreeMap::new();
        for perm in &req.permissions {
            if let Some(page_id) = page_ids.get(perm.page_slug.as_str()) {
                levels.insert(*page_id, perm.level);
            }
        }

        let mut upserts = Vec::new();
        let mut removals = Vec::new();
        for (page_id, level) in levels {
            match level.mask() {
                Some(perms_mask) => upserts.push(RolePagePerm {
                    role_id: role.id,
                    page_id,
                    perms_mask,
                }),
                None => removals.push(page_id),
            }
        }

        self.store.apply_role_page_perms(role.id, &upserts, &removals).await?;

        tracing::info!(
            role = %role.slug,
            set = upserts.len(),
            removed = removals.len(),
            "role page defaults updated"
        );

        Ok(SetRolePagesResponse {
            ok: true,
            role_slug,
            permissions_set: upserts.len(),
            permissions_removed: removals.len(),
            details: req
                .permissions
                .iter()
                .map(|p| RolePageDetail {
                    page_slug: p.page_slug.clone(),
                    level: p.level,
                    perms_mask: p.level.mask().unwrap_or(PermMask::NONE),
                })
                .collect(),
        })
    }

    pub async fn list_roles_with_permissions(&self) -> AppResult<RolesResponse> {
        let roles = self.store.list_roles().await?;
        let perms = self.store.list_role_page_perms().await?;

        let roles = roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permissions: perms
                    .iter()
                    .filter(|row| row.role_id == role.id)
                    .map(|row| RolePermissionEntry {
                        page_slug: row.page.slug.clone(),
                        page_label: row.page.label.clone(),
                        perms_mask: row.perms_mask,
                    })
                    .collect(),
                id: role.id,
                slug: role.slug,
                label: role.label,
            })
            .collect();

        Ok(RolesResponse { roles })
    }

    pub async fn role_overview(&self) -> AppResult<RoleOverviewResponse> {
        let listing = self.list_roles_with_permissions().await?;
        let roles = listing
            .roles
            .into_iter()
            .map(|role| RoleOverview {
                id: role.id,
                slug: role.slug,
                label: role.label,
                page_permissions: role
                    .permissions
                    .into_iter()
                    .map(|p| RolePageSummary {
                        page_slug: p.page_slug,
                        perms_mask: p.perms_mask,
                    })
                    .collect(),
            })
            .collect();

        Ok(RoleOverviewResponse { roles })
    }

    pub async fn list_pages(&self) -> AppResult<PagesResponse> {
        Ok(PagesResponse {
            pages: self.store.list_pages().await?,
        })
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn set_user_page(&self, req: SetUserPageRequest) -> AppResult<SetLevelResponse> {
        let user_id = parse_user_id(&req.user_id)?;
        let page = self
            .require_page(req.page_slug.trim())
            .await
            .map_err(|err| match err {
                AppError::InvalidInput { .. } => AppError::invalid_input("Invalid page_slug"),
                other => other,
            })?;

        match req.level.mask() {
            None => self.store.delete_user_page_perm(user_id, page.id).await?,
            Some(mask) => self.store.upsert_user_page_perm(user_id, page.id, mask).await?,
        }

        tracing::info!(user_id = %user_id, page = %page.slug, level = req.level.as_str(), "user page override set");

        Ok(SetLevelResponse {
            ok: true,
            level: req.level,
            perms_mask: req.level.mask(),
        })
    }

    /// Gives `user_id` the role and materializes its current page defaults as
    /// per-user overrides, discarding the user's previous overrides.
    ///
    /// Only the role upsert can fail the call. Later edits to the role's
    /// defaults do not reach users assigned before them.
    pub async fn assign_role(&self, user_id: Uuid, role: &Role) -> AppResult<Outcome<usize>> {
        self.store.upsert_user_role(user_id, role.id).await?;
        tracing::info!(user_id = %user_id, role = %role.slug, "role assigned");

        if let Err(err) = self.store.clear_user_page_perms(user_id).await {
            tracing::warn!(user_id = %user_id, error = %err, "failed to clear page overrides");
            return Ok(Outcome::partial(0, "Role assigned but failed to clear previous page permissions"));
        }

        let defaults = match self.store.role_page_perms_for(role.id).await {
            Ok(defaults) => defaults,
            Err(err) => {
                tracing::warn!(user_id = %user_id, role = %role.slug, error = %err, "failed to read role permissions");
                return Ok(Outcome::partial(0, "Role assigned but failed to read role permissions"));
            }
        };

        let rows: Vec<(i64, PermMask)> = defaults.iter().map(|d| (d.page_id, d.perms_mask)).collect();
        match self.store.insert_user_page_perms(user_id, &rows).await {
            Ok(copied) => Ok(Outcome::complete(copied as usize)),
            Err(err) => {
                tracing::warn!(user_id = %user_id, role = %role.slug, error = %err, "failed to copy role permissions");
                Ok(Outcome::partial(0, "Role assigned but failed to copy role permissions"))
            }
        }
    }

    pub async fn update_user_role(&self, req: UpdateUserRoleRequest) -> AppResult<RoleAssignmentResponse> {
        let user_id = parse_user_id(&req.user_id)?;
        let role = self.require_role(req.role_slug.trim()).await?;
        let outcome = self.assign_role(user_id, &role).await?;

        Ok(RoleAssignmentResponse {
            ok: true,
            user_id,
            role_slug: role.slug,
            permissions_copied: outcome.value,
            warnings: outcome.warnings,
        })
    }

    pub async fn assign_admin(&self, req: AssignAdminRequest) -> AppResult<RoleAssignmentResponse> {
        let user_id = parse_user_id(&req.user_id)?;
        let role = self
            .store
            .find_role(roles::ADMIN)
            .await?
            .ok_or_else(|| AppError::invalid_input("Admin role missing. Please run migrations first."))?;
        let outcome = self.assign_role(user_id, &role).await?;

        Ok(RoleAssignmentResponse {
            ok: true,
            user_id,
            role_slug: role.slug,
            permissions_copied: outcome.value,
            warnings: outcome.warnings,
        })
    }

    /// Creates an account and optionally assigns it a role.
    ///
    /// An unknown role is rejected before the account exists. A failed
    /// assignment leaves the account in place and is reported as a warning.
    pub async fn create_user(&self, identity: &dyn IdentityProvider, req: CreateUserRequest) -> AppResult<CreateUserResponse> {
        let role = match req.role_slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                let role = self
                    .store
                    .find_role(slug)
                    .await?
                    .ok_or_else(|| AppError::invalid_input(format!("Role \"{slug}\" does not exist")))?;
                Some(role)
            }
            Some(_) => return Err(AppError::invalid_input("Invalid role_slug")),
            None => None,
        };

        let user = identity.create_user(&req.email, &req.password, req.email_confirm).await?;

        let Some(role) = role else {
            return Ok(CreateUserResponse {
                user,
                role_assigned: false,
                role_slug: None,
                warning: None,
            });
        };

        match self.assign_role(user.id, &role).await {
            Ok(outcome) => Ok(CreateUserResponse {
                user,
                role_assigned: true,
                role_slug: Some(role.slug),
                warning: (!outcome.warnings.is_empty()).then(|| outcome.warnings.join("; ")),
            }),
            Err(err) => {
                tracing::warn!(user_id = %user.id, role = %role.slug, error = %err, "role assignment failed for new user");
                Ok(CreateUserResponse {
                    user,
                    role_assigned: false,
                    role_slug: None,
                    warning: Some("User created but role assignment failed. Please assign role manually.".to_string()),
                })
            }
        }
    }

    pub async fn list_users(&self, identity: &dyn IdentityProvider) -> AppResult<UsersResponse> {
        let accounts = identity.list_users().await?;
        let roles: HashMap<Uuid, Role> = self.store.list_user_roles().await?.into_iter().collect();

        let users = accounts
            .into_iter()
            .map(|account| UserSummary {
                role: roles.get(&account.id).cloned(),
                id: account.id,
                email: account.email,
                created_at: account.created_at,
                last_sign_in_at: account.last_sign_in_at,
            })
            .collect();

        Ok(UsersResponse { users })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::authz::{pages, EffectivePermissionResolver};
    use crate::errors::codes;
    use crate::identity::Identity;
    use crate::models::user::AccountRecord;
    use crate::store::MemoryStore;
    use crate::utils::utc_now;

    fn service() -> (Arc<MemoryStore>, AdminService) {
        let store = Arc::new(MemoryStore::seeded());
        (store.clone(), AdminService::new(store))
    }

    fn perm(page_slug: &str, level: Level) -> PagePermissionInput {
        PagePermissionInput {
            page_slug: page_slug.to_string(),
            level,
        }
    }

    async fn role_mask(store: &MemoryStore, role: &str, page: &str) -> Option<PermMask> {
        let role = store.find_role(role).await.unwrap().unwrap();
        let page = store.find_pages(&[page.to_string()]).await.unwrap()[0].id;
        store
            .role_page_perms_for(role.id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.page_id == page)
            .map(|p| p.perms_mask)
    }

    #[derive(Default)]
    struct FakeIdentity {
        accounts: Mutex<Vec<AccountRecord>>,
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn verify_token(&self, _token: &str) -> AppResult<Identity> {
            Err(AppError::invalid_token("Invalid token"))
        }

        async fn create_user(&self, email: &str, _password: &str, email_confirm: bool) -> AppResult<AccountRecord> {
            let account = AccountRecord {
                id: Uuid::new_v4(),
                email: email.to_string(),
                email_confirmed: email_confirm,
                created_at: utc_now(),
                last_sign_in_at: None,
            };
            self.accounts.lock().unwrap().push(account.clone());
            Ok(account)
        }

        async fn list_users(&self) -> AppResult<Vec<AccountRecord>> {
            Ok(self.accounts.lock().unwrap().clone())
        }

        async fn find_user_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
            Ok(self.accounts.lock().unwrap().iter().find(|a| a.email == email).cloned())
        }
    }

    #[tokio::test]
    async fn create_role_seeds_permissions() {
        let (store, admin) = service();
        let resp = admin
            .create_role(CreateRoleRequest {
                slug: "auditor".into(),
                label: "Auditor".into(),
                permissions: Some(vec![perm("reports", Level::View), perm("settings", Level::Admin)]),
            })
            .await
            .unwrap();

        assert_eq!(resp.permissions_assigned, 2);
        assert!(resp.warning.is_none());
        assert_eq!(role_mask(&store, "auditor", "reports").await, Some(PermMask::READ));
        assert_eq!(role_mask(&store, "auditor", "settings").await, Some(PermMask::FULL));
    }

    #[tokio::test]
    async fn create_role_rejects_bad_and_duplicate_slugs() {
        let (_, admin) = service();
        let bad = admin
            .create_role(CreateRoleRequest {
                slug: "Bad Slug".into(),
                label: "Bad".into(),
                permissions: None,
            })
            .await
            .unwrap_err();
        assert_eq!(bad.code(), codes::INVALID_SLUG);

        let padded = admin
            .create_role(CreateRoleRequest {
                slug: " auditor ".into(),
                label: "Auditor".into(),
                permissions: None,
            })
            .await
            .unwrap_err();
        assert_eq!(padded.code(), codes::INVALID_SLUG);

        let dup = admin
            .create_role(CreateRoleRequest {
                slug: "viewer".into(),
                label: "Viewer again".into(),
                permissions: None,
            })
            .await
            .unwrap_err();
        assert_eq!(dup.code(), codes::ALREADY_EXISTS);
    }

    #[tokio::test]
    async fn create_role_keeps_role_when_seeding_fails() {
        let (store, admin) = service();
        let resp = admin
            .create_role(CreateRoleRequest {
                slug: "ops".into(),
                label: "Ops".into(),
                permissions: Some(vec![perm("reports", Level::View), perm("nowhere", Level::View)]),
            })
            .await
            .unwrap();
        assert_eq!(resp.permissions_assigned, 0);
        assert_eq!(resp.warning.as_deref(), Some("Role created but some pages are invalid: nowhere"));
        assert!(store.find_role("ops").await.unwrap().is_some());

        store.fail_on("apply_role_page_perms");
        let resp = admin
            .create_role(CreateRoleRequest {
                slug: "ops2".into(),
                label: "Ops 2".into(),
                permissions: Some(vec![perm("reports", Level::View)]),
            })
            .await
            .unwrap();
        assert_eq!(resp.warning.as_deref(), Some("Role created but failed to assign permissions"));
    }

    #[tokio::test]
    async fn set_role_page_round_trips_through_listing() {
        let (_, admin) = service();
        admin
            .set_role_page(SetRolePageRequest {
                role_slug: "viewer".into(),
                page_slug: "settings".into(),
                level: Level::Admin,
            })
            .await
            .unwrap();

        let listing = admin.list_roles_with_permissions().await.unwrap();
        let viewer = listing.roles.iter().find(|r| r.slug == "viewer").unwrap();
        let settings = viewer.permissions.iter().find(|p| p.page_slug == "settings").unwrap();
        assert_eq!(settings.perms_mask.to_raw(), 15);
    }

    #[tokio::test]
    async fn set_role_page_none_removes_the_row() {
        let (store, admin) = service();
        let resp = admin
            .set_role_page(SetRolePageRequest {
                role_slug: "viewer".into(),
                page_slug: "reports".into(),
                level: Level::None,
            })
            .await
            .unwrap();
        assert_eq!(resp.perms_mask, None);
        assert_eq!(role_mask(&store, "viewer", "reports").await, None);
    }

    #[tokio::test]
    async fn bulk_with_unknown_page_changes_nothing() {
        let (store, admin) = service();
        let before = store.role_page_perms_for(2).await.unwrap();

        let err = admin
            .set_role_pages(SetRolePagesRequest {
                role_slug: "viewer".into(),
                permissions: vec![
                    perm("reports", Level::None),
                    perm("settings", Level::Admin),
                    perm("ghost", Level::View),
                ],
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::INVALID_INPUT);
        assert_eq!(err.to_string(), "Invalid page slugs: ghost");
        assert_eq!(store.role_page_perms_for(2).await.unwrap(), before);
    }

    #[tokio::test]
    async fn bulk_applies_sets_and_removals() {
        let (store, admin) = service();
        let resp = admin
            .set_role_pages(SetRolePagesRequest {
                role_slug: "viewer".into(),
                permissions: vec![
                    perm("reports", Level::None),
                    perm("users", Level::View),
                    perm("settings", Level::View),
                    perm("settings", Level::Admin),
                ],
            })
            .await
            .unwrap();

        assert_eq!(resp.permissions_set, 2);
        assert_eq!(resp.permissions_removed, 1);
        assert_eq!(resp.details.len(), 4);
        assert_eq!(role_mask(&store, "viewer", "reports").await, None);
        assert_eq!(role_mask(&store, "viewer", "users").await, Some(PermMask::READ));
        assert_eq!(role_mask(&store, "viewer", "settings").await, Some(PermMask::FULL));
    }

    #[tokio::test]
    async fn setting_view_twice_is_idempotent() {
        let (store, admin) = service();
        let user = Uuid::new_v4();
        for _ in 0..2 {
            admin
                .set_user_page(SetUserPageRequest {
                    user_id: user.to_string(),
                    page_slug: "reports".into(),
                    level: Level::View,
                })
                .await
                .unwrap();
        }
        let reports = store.find_pages(&["reports".to_string()]).await.unwrap()[0].id;
        assert_eq!(store.user_override(user, reports), Some(PermMask::READ));
    }

    #[tokio::test]
    async fn set_user_page_validates_inputs() {
        let (_, admin) = service();
        let err = admin
            .set_user_page(SetUserPageRequest {
                user_id: "not-a-uuid".into(),
                page_slug: "reports".into(),
                level: Level::View,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_UUID);

        let err = admin
            .set_user_page(SetUserPageRequest {
                user_id: Uuid::new_v4().to_string(),
                page_slug: "ghost".into(),
                level: Level::View,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid page_slug");
    }

    #[tokio::test]
    async fn reassignment_materializes_a_snapshot() {
        let (store, admin) = service();
        let user = Uuid::new_v4();
        let resolver = EffectivePermissionResolver::new(store.clone());

        admin
            .update_user_role(UpdateUserRoleRequest {
                user_id: user.to_string(),
                role_slug: "admin".into(),
            })
            .await
            .unwrap();
        assert_eq!(resolver.resolve(user, pages::SETTINGS).await.unwrap(), PermMask::FULL);

        let resp = admin
            .update_user_role(UpdateUserRoleRequest {
                user_id: user.to_string(),
                role_slug: "viewer".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.permissions_copied, 2);
        assert!(resp.warnings.is_empty());
        assert_eq!(resolver.resolve(user, pages::SETTINGS).await.unwrap(), PermMask::NONE);
        assert_eq!(resolver.resolve(user, pages::REPORTS).await.unwrap(), PermMask::READ);

        // Later edits to the role's defaults do not reach the materialized rows.
        admin
            .set_role_page(SetRolePageRequest {
                role_slug: "viewer".into(),
                page_slug: "reports".into(),
                level: Level::Admin,
            })
            .await
            .unwrap();
        assert_eq!(resolver.resolve(user, pages::REPORTS).await.unwrap(), PermMask::READ);
    }

    #[tokio::test]
    async fn assign_admin_grants_full_mask_everywhere() {
        let (store, admin) = service();
        let user = Uuid::new_v4();
        let resp = admin
            .assign_admin(AssignAdminRequest {
                user_id: user.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.role_slug, "admin");
        assert_eq!(resp.permissions_copied, 4);

        let resolver = EffectivePermissionResolver::new(store);
        for page in [pages::DASHBOARD, pages::REPORTS, pages::USERS, pages::SETTINGS] {
            assert_eq!(resolver.resolve(user, page).await.unwrap().to_raw(), 15);
        }
    }

    #[tokio::test]
    async fn copy_failure_is_reported_as_warning() {
        let (store, admin) = service();
        store.fail_on("insert_user_page_perms");
        let resp = admin
            .update_user_role(UpdateUserRoleRequest {
                user_id: Uuid::new_v4().to_string(),
                role_slug: "viewer".into(),
            })
            .await
            .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.permissions_copied, 0);
        assert_eq!(resp.warnings, vec!["Role assigned but failed to copy role permissions".to_string()]);
    }

    #[tokio::test]
    async fn role_upsert_failure_is_an_error() {
        let (store, admin) = service();
        store.fail_on("upsert_user_role");
        let err = admin
            .update_user_role(UpdateUserRoleRequest {
                user_id: Uuid::new_v4().to_string(),
                role_slug: "viewer".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn create_user_with_unknown_role_creates_nothing() {
        let (_, admin) = service();
        let identity = FakeIdentity::default();
        let err = admin
            .create_user(
                &identity,
                CreateUserRequest {
                    email: "ada@example.com".into(),
                    password: "long enough".into(),
                    email_confirm: true,
                    role_slug: Some("ghost".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_INPUT);
        assert!(identity.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_user_reports_failed_assignment_as_warning() {
        let (store, admin) = service();
        let identity = FakeIdentity::default();
        store.fail_on("upsert_user_role");

        let resp = admin
            .create_user(
                &identity,
                CreateUserRequest {
                    email: "ada@example.com".into(),
                    password: "long enough".into(),
                    email_confirm: false,
                    role_slug: Some("viewer".into()),
                },
            )
            .await
            .unwrap();
        assert!(!resp.role_assigned);
        assert_eq!(
            resp.warning.as_deref(),
            Some("User created but role assignment failed. Please assign role manually.")
        );
        assert_eq!(identity.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_users_joins_roles() {
        let (_, admin) = service();
        let identity = FakeIdentity::default();
        admin
            .create_user(
                &identity,
                CreateUserRequest {
                    email: "viewer@example.com".into(),
                    password: "long enough".into(),
                    email_confirm: true,
                    role_slug: Some("viewer".into()),
                },
            )
            .await
            .unwrap();
        identity.create_user("plain@example.com", "long enough", false).await.unwrap();

        let users = admin.list_users(&identity).await.unwrap().users;
        assert_eq!(users.len(), 2);
        let viewer = users.iter().find(|u| u.email == "viewer@example.com").unwrap();
        assert_eq!(viewer.role.as_ref().map(|r| r.slug.as_str()), Some("viewer"));
        let plain = users.iter().find(|u| u.email == "plain@example.com").unwrap();
        assert!(plain.role.is_none());
    }
}
