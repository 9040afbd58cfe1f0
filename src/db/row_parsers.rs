use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::authz::PermMask;
use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::models::rbac::{Page, Role};
use crate::models::user::AccountRecord;

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" with optional fraction
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, AppError> {
    let raw: String = column(row, name)?;
    Uuid::parse_str(&raw).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", name, e)))
}

pub fn mask_column(row: &SqliteRow, name: &str) -> Result<PermMask, AppError> {
    let raw: i64 = column(row, name)?;
    PermMask::from_raw(raw).map_err(|_| AppError::internal(format!("stored {} out of range: {}", name, raw)))
}

pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    Ok(Role {
        id: column(row, "id")?,
        slug: column(row, "slug")?,
        label: column(row, "label")?,
    })
}

pub fn page_from_row(row: &SqliteRow) -> Result<Page, AppError> {
    Ok(Page {
        id: column(row, "id")?,
        slug: column(row, "slug")?,
        label: column(row, "label")?,
    })
}

pub fn profile_from_row(row: &SqliteRow) -> Result<Profile, AppError> {
    let updated_at: String = column(row, "updated_at")?;
    Ok(Profile {
        id: uuid_column(row, "id")?,
        full_name: column(row, "full_name")?,
        avatar_url: column(row, "avatar_url")?,
        phone: column(row, "phone")?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn account_from_row(row: &SqliteRow) -> Result<AccountRecord, AppError> {
    let created_at: String = column(row, "created_at")?;
    let last_sign_in_at: Option<String> = column(row, "last_sign_in_at")?;
    let email_confirmed: i64 = column(row, "email_confirmed")?;
    Ok(AccountRecord {
        id: uuid_column(row, "id")?,
        email: column(row, "email")?,
        email_confirmed: email_confirmed != 0,
        created_at: parse_datetime(&created_at)?,
        last_sign_in_at: parse_opt_datetime(last_sign_in_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_sqlite_timestamps() {
        let rfc = parse_datetime("2025-11-19T12:34:56Z").expect("rfc3339");
        let sqlite = parse_datetime("2025-11-19 12:34:56").expect("sqlite format");
        assert_eq!(rfc, sqlite);

        let date_only = parse_datetime("2025-11-19").expect("date only");
        assert_eq!(date_only.to_rfc3339(), "2025-11-19T00:00:00+00:00");
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_datetime("yesterday").is_err());
        assert_eq!(parse_opt_datetime(Some("  ".into())).ok(), Some(None));
    }
}
