use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{RolePagePermRow, Store};
use crate::authz::PermMask;
use crate::db::row_parsers::{mask_column, page_from_row, profile_from_row, role_from_row, uuid_column};
use crate::errors::{AppError, AppResult};
use crate::models::profile::{Profile, ProfileUpdateRequest};
use crate::models::rbac::{EffectivePagePerm, Page, Role, RolePagePerm};
use crate::utils::utc_now;

const PROFILE_COLUMNS: &str = "id, full_name, avatar_url, phone, updated_at";

/// Production store over the relational database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, slug, label FROM roles ORDER BY slug")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(role_from_row).collect()
    }

    async fn find_role(&self, slug: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query("SELECT id, slug, label FROM roles WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn insert_role(&self, slug: &str, label: &str) -> AppResult<Role> {
        let row = sqlx::query("INSERT INTO roles (slug, label) VALUES (?, ?) RETURNING id, slug, label")
            .bind(slug)
            .bind(label)
            .fetch_one(&self.pool)
            .await?;
        role_from_row(&row)
    }

    async fn list_pages(&self) -> AppResult<Vec<Page>> {
        let rows = sqlx::query("SELECT id, slug, label FROM pages ORDER BY slug")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(page_from_row).collect()
    }

    async fn find_pages(&self, slugs: &[String]) -> AppResult<Vec<Page>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, slug, label FROM pages WHERE slug IN (");
        let mut separated = builder.separated(", ");
        for slug in slugs {
            separated.push_bind(slug.clone());
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(page_from_row).collect()
    }

    async fn list_role_page_perms(&self) -> AppResult<Vec<RolePagePermRow>> {
        let rows = sqlx::query(
            r#"
            SELECT rpp.role_id, rpp.perms_mask, p.id, p.slug, p.label
            FROM role_page_perms rpp
            INNER JOIN pages p ON p.id = rpp.page_id
            ORDER BY rpp.role_id, p.slug
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<RolePagePermRow> {
                Ok(RolePagePermRow {
                    role_id: row.try_get("role_id")?,
                    page: page_from_row(row)?,
                    perms_mask: mask_column(row, "perms_mask")?,
                })
            })
            .collect()
    }

    async fn role_page_perms_for(&self, role_id: i64) -> AppResult<Vec<RolePagePerm>> {
        let rows = sqlx::query("SELECT role_id, page_id, perms_mask FROM role_page_perms WHERE role_id = ? ORDER BY page_id")
            .bind(role_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<RolePagePerm> {
                Ok(RolePagePerm {
                    role_id: row.try_get("role_id")?,
                    page_id: row.try_get("page_id")?,
                    perms_mask: mask_column(row, "perms_mask")?,
                })
            })
            .collect()
    }

    async fn apply_role_page_perms(&self, role_id: i64, upserts: &[RolePagePerm], removals: &[i64]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for page_id in removals {
            sqlx::query("DELETE FROM role_page_perms WHERE role_id = ? AND page_id = ?")
                .bind(role_id)
                .bind(*page_id)
                .execute(&mut *tx)
                .await?;
        }

        for perm in upserts {
            sqlx::query(
                r#"
                INSERT INTO role_page_perms (role_id, page_id, perms_mask) VALUES (?, ?, ?)
                ON CONFLICT(role_id, page_id) DO UPDATE SET perms_mask = excluded.perms_mask
                "#,
            )
            .bind(perm.role_id)
            .bind(perm.page_id)
            .bind(perm.perms_mask.to_raw())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn user_role(&self, user_id: Uuid) -> AppResult<Option<Role>> {
        let row = sqlx::query(
            "SELECT r.id, r.slug, r.label FROM roles r INNER JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn list_user_roles(&self) -> AppResult<Vec<(Uuid, Role)>> {
        let rows = sqlx::query(
            "SELECT ur.user_id, r.id, r.slug, r.label FROM user_roles ur INNER JOIN roles r ON r.id = ur.role_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<(Uuid, Role)> { Ok((uuid_column(row, "user_id")?, role_from_row(row)?)) })
            .collect()
    }

    async fn upsert_user_role(&self, user_id: Uuid, role_id: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?) ON CONFLICT(user_id) DO UPDATE SET role_id = excluded.role_id",
        )
        .bind(user_id.to_string())
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user_page_perm(&self, user_id: Uuid, page_id: i64, mask: PermMask) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_page_perms (user_id, page_id, perms_mask) VALUES (?, ?, ?)
            ON CONFLICT(user_id, page_id) DO UPDATE SET perms_mask = excluded.perms_mask
            "#,
        )
        .bind(user_id.to_string())
        .bind(page_id)
        .bind(mask.to_raw())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user_page_perm(&self, user_id: Uuid, page_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM user_page_perms WHERE user_id = ? AND page_id = ?")
            .bind(user_id.to_string())
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_user_page_perms(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM user_page_perms WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_user_page_perms(&self, user_id: Uuid, rows: &[(i64, PermMask)]) -> AppResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let user_id = user_id.to_string();
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO user_page_perms (user_id, page_id, perms_mask) ");
        builder.push_values(rows, |mut b, (page_id, mask)| {
            b.push_bind(user_id.clone()).push_bind(*page_id).push_bind(mask.to_raw());
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn effective_mask(&self, user_id: Uuid, page_slug: &str) -> AppResult<Option<PermMask>> {
        // Single statement against the view: atomic with respect to concurrent writers.
        let row = sqlx::query("SELECT perms_mask FROM user_effective_page_perms WHERE user_id = ? AND page_slug = ? LIMIT 1")
            .bind(user_id.to_string())
            .bind(page_slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(|row| mask_column(row, "perms_mask")).transpose()
    }

    async fn effective_pages(&self, user_id: Uuid) -> AppResult<Vec<EffectivePagePerm>> {
        let rows = sqlx::query("SELECT page_slug, perms_mask FROM user_effective_page_perms WHERE user_id = ? ORDER BY page_slug")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<EffectivePagePerm> {
                Ok(EffectivePagePerm {
                    page_slug: row.try_get("page_slug")?,
                    perms_mask: mask_column(row, "perms_mask")?,
                })
            })
            .collect()
    }

    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn update_profile(&self, user_id: Uuid, changes: &ProfileUpdateRequest) -> AppResult<Option<Profile>> {
        let Some(mut profile) = self.get_profile(user_id).await? else {
            return Ok(None);
        };

        changes.apply_to(&mut profile);
        profile.updated_at = utc_now();

        let result = sqlx::query("UPDATE profiles SET full_name = ?, avatar_url = ?, phone = ?, updated_at = ? WHERE id = ?")
            .bind(&profile.full_name)
            .bind(&profile.avatar_url)
            .bind(&profile.phone)
            .bind(profile.updated_at.to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Profile not found"));
        }

        Ok(Some(profile))
    }

    async fn list_profiles(&self) -> AppResult<Vec<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY updated_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(profile_from_row).collect()
    }
}
