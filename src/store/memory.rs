use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{RolePagePermRow, Store};
use crate::authz::{resolve_mask, PermMask};
use crate::errors::{AppError, AppResult};
use crate::models::profile::{Profile, ProfileUpdateRequest};
use crate::models::rbac::{EffectivePagePerm, Page, Role, RolePagePerm};
use crate::utils::utc_now;

#[derive(Debug, Default)]
struct State {
    roles: Vec<Role>,
    pages: Vec<Page>,
    role_perms: BTreeMap<(i64, i64), PermMask>,
    user_roles: HashMap<Uuid, i64>,
    user_perms: BTreeMap<(Uuid, i64), PermMask>,
    profiles: BTreeMap<Uuid, Profile>,
}

impl State {
    fn role_by_id(&self, role_id: i64) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    fn page_by_slug(&self, slug: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.slug == slug)
    }

    fn resolve(&self, user_id: Uuid, page_id: i64) -> Option<PermMask> {
        let override_mask = self.user_perms.get(&(user_id, page_id)).copied();
        let role_default = self
            .user_roles
            .get(&user_id)
            .and_then(|role_id| self.role_perms.get(&(*role_id, page_id)).copied());

        if override_mask.is_none() && role_default.is_none() {
            None
        } else {
            Some(resolve_mask(override_mask, role_default))
        }
    }
}

/// In-memory [`Store`] for tests, with per-operation failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    failing: RwLock<HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same pages and roles the initial migration seeds.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut state = store.write();
            for (slug, label) in [("dashboard", "Dashboard"), ("reports", "Reports"), ("users", "Users"), ("settings", "Settings")] {
                let id = state.pages.len() as i64 + 1;
                state.pages.push(Page {
                    id,
                    slug: slug.to_string(),
                    label: label.to_string(),
                });
            }
            state.roles.push(Role {
                id: 1,
                slug: "admin".into(),
                label: "Administrator".into(),
            });
            state.roles.push(Role {
                id: 2,
                slug: "viewer".into(),
                label: "Viewer".into(),
            });
            let page_ids: Vec<(i64, String)> = state.pages.iter().map(|p| (p.id, p.slug.clone())).collect();
            for (page_id, slug) in page_ids {
                state.role_perms.insert((1, page_id), PermMask::FULL);
                if slug == "dashboard" || slug == "reports" {
                    state.role_perms.insert((2, page_id), PermMask::READ);
                }
            }
        }
        store
    }

    /// Makes every later call of `operation` fail with a storage error.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(operation);
    }

    pub fn add_page(&self, slug: &str, label: &str) -> Page {
        let mut state = self.write();
        let page = Page {
            id: state.pages.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            slug: slug.to_string(),
            label: label.to_string(),
        };
        state.pages.push(page.clone());
        page
    }

    pub fn add_profile(&self, user_id: Uuid) -> Profile {
        let profile = Profile {
            id: user_id,
            full_name: None,
            avatar_url: None,
            phone: None,
            updated_at: utc_now(),
        };
        self.write().profiles.insert(user_id, profile.clone());
        profile
    }

    /// Stored override row, bypassing failure injection.
    #[cfg(test)]
    pub fn user_override(&self, user_id: Uuid, page_id: i64) -> Option<PermMask> {
        self.read().user_perms.get(&(user_id, page_id)).copied()
    }

    fn check(&self, operation: &'static str) -> AppResult<()> {
        let failing = self.failing.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing.contains(operation) {
            return Err(AppError::storage(format!("{operation} failed")));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.check("ping")
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.check("list_roles")?;
        let mut roles = self.read().roles.clone();
        roles.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(roles)
    }

    async fn find_role(&self, slug: &str) -> AppResult<Option<Role>> {
        self.check("find_role")?;
        Ok(self.read().roles.iter().find(|r| r.slug == slug).cloned())
    }

    async fn insert_role(&self, slug: &str, label: &str) -> AppResult<Role> {
        self.check("insert_role")?;
        let mut state = self.write();
        if state.roles.iter().any(|r| r.slug == slug) {
            return Err(AppError::Storage {
                kind: crate::errors::StorageErrorKind::UniqueViolation,
                message: "A record with this value already exists".into(),
                original: format!("UNIQUE constraint failed: roles.slug ({slug})"),
            });
        }
        let role = Role {
            id: state.roles.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            slug: slug.to_string(),
            label: label.to_string(),
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn list_pages(&self) -> AppResult<Vec<Page>> {
        self.check("list_pages")?;
        let mut pages = self.read().pages.clone();
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(pages)
    }

    async fn find_pages(&self, slugs: &[String]) -> AppResult<Vec<Page>> {
        self.check("find_pages")?;
        Ok(self
            .read()
            .pages
            .iter()
            .filter(|p| slugs.contains(&p.slug))
            .cloned()
            .collect())
    }

    async fn list_role_page_perms(&self) -> AppResult<Vec<RolePagePermRow>> {
        self.check("list_role_page_perms")?;
        let state = self.read();
        let mut rows: Vec<RolePagePermRow> = state
            .role_perms
            .iter()
            .filter_map(|((role_id, page_id), mask)| {
                state.pages.iter().find(|p| p.id == *page_id).map(|page| RolePagePermRow {
                    role_id: *role_id,
                    page: page.clone(),
                    perms_mask: *mask,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.role_id.cmp(&b.role_id).then_with(|| a.page.slug.cmp(&b.page.slug)));
        Ok(rows)
    }

    async fn role_page_perms_for(&self, role_id: i64) -> AppResult<Vec<RolePagePerm>> {
        self.check("role_page_perms_for")?;
        Ok(self
            .read()
            .role_perms
            .iter()
            .filter(|((rid, _), _)| *rid == role_id)
            .map(|((rid, page_id), mask)| RolePagePerm {
                role_id: *rid,
                page_id: *page_id,
                perms_mask: *mask,
            })
            .collect())
    }

    async fn apply_role_page_perms(&self, role_id: i64, upserts: &[RolePagePerm], removals: &[i64]) -> AppResult<()> {
        self.check("apply_role_page_perms")?;
        let mut state = self.write();
        for page_id in removals {
            state.role_perms.remove(&(role_id, *page_id));
        }
        for perm in upserts {
            state.role_perms.insert((perm.role_id, perm.page_id), perm.perms_mask);
        }
        Ok(())
    }

    async fn user_role(&self, user_id: Uuid) -> AppResult<Option<Role>> {
        self.check("user_role")?;
        let state = self.read();
        Ok(state
            .user_roles
            .get(&user_id)
            .and_then(|role_id| state.role_by_id(*role_id))
            .cloned())
    }

    async fn list_user_roles(&self) -> AppResult<Vec<(Uuid, Role)>> {
        self.check("list_user_roles")?;
        let state = self.read();
        Ok(state
            .user_roles
            .iter()
            .filter_map(|(user_id, role_id)| state.role_by_id(*role_id).map(|role| (*user_id, role.clone())))
            .collect())
    }

    async fn upsert_user_role(&self, user_id: Uuid, role_id: i64) -> AppResult<()> {
        self.check("upsert_user_role")?;
        self.write().user_roles.insert(user_id, role_id);
        Ok(())
    }

    async fn upsert_user_page_perm(&self, user_id: Uuid, page_id: i64, mask: PermMask) -> AppResult<()> {
        self.check("upsert_user_page_perm")?;
        self.write().user_perms.insert((user_id, page_id), mask);
        Ok(())
    }

    async fn delete_user_page_perm(&self, user_id: Uuid, page_id: i64) -> AppResult<()> {
        self.check("delete_user_page_perm")?;
        self.write().user_perms.remove(&(user_id, page_id));
        Ok(())
    }

    async fn clear_user_page_perms(&self, user_id: Uuid) -> AppResult<u64> {
        self.check("clear_user_page_perms")?;
        let mut state = self.write();
        let before = state.user_perms.len();
        state.user_perms.retain(|(uid, _), _| *uid != user_id);
        Ok((before - state.user_perms.len()) as u64)
    }

    async fn insert_user_page_perms(&self, user_id: Uuid, rows: &[(i64, PermMask)]) -> AppResult<u64> {
        self.check("insert_user_page_perms")?;
        let mut state = self.write();
        if rows.iter().any(|(page_id, _)| state.user_perms.contains_key(&(user_id, *page_id))) {
            return Err(AppError::Storage {
                kind: crate::errors::StorageErrorKind::UniqueViolation,
                message: "A record with this value already exists".into(),
                original: "UNIQUE constraint failed: user_page_perms.user_id, user_page_perms.page_id".into(),
            });
        }
        for (page_id, mask) in rows {
            state.user_perms.insert((user_id, *page_id), *mask);
        }
        Ok(rows.len() as u64)
    }

    async fn effective_mask(&self, user_id: Uuid, page_slug: &str) -> AppResult<Option<PermMask>> {
        self.check("effective_mask")?;
        // One read guard for the whole lookup: writers cannot interleave.
        let state = self.read();
        Ok(state.page_by_slug(page_slug).and_then(|page| state.resolve(user_id, page.id)))
    }

    async fn effective_pages(&self, user_id: Uuid) -> AppResult<Vec<EffectivePagePerm>> {
        self.check("effective_pages")?;
        let state = self.read();
        let mut pages: Vec<EffectivePagePerm> = state
            .pages
            .iter()
            .filter_map(|page| {
                state.resolve(user_id, page.id).map(|mask| EffectivePagePerm {
                    page_slug: page.slug.clone(),
                    perms_mask: mask,
                })
            })
            .collect();
        pages.sort_by(|a, b| a.page_slug.cmp(&b.page_slug));
        Ok(pages)
    }

    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        self.check("get_profile")?;
        Ok(self.read().profiles.get(&user_id).cloned())
    }

    async fn update_profile(&self, user_id: Uuid, changes: &ProfileUpdateRequest) -> AppResult<Option<Profile>> {
        self.check("update_profile")?;
        let mut state = self.write();
        let Some(profile) = state.profiles.get_mut(&user_id) else {
            return Ok(None);
        };
        changes.apply_to(profile);
        profile.updated_at = utc_now();
        Ok(Some(profile.clone()))
    }

    async fn list_profiles(&self) -> AppResult<Vec<Profile>> {
        self.check("list_profiles")?;
        Ok(self.read().profiles.values().cloned().collect())
    }
}
