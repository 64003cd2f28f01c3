//! Database row types — these map directly to SQLite rows.
//! Distinct from catbase-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

pub struct CatRow {
    pub id: i64,
    pub name: String,
    pub origin: String,
    pub description: String,
    pub care_instructions: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub view_count: i64,
    pub discussion_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a catalog entry. Counters are not settable.
pub struct NewCat<'a> {
    pub name: &'a str,
    pub origin: &'a str,
    pub description: &'a str,
    pub care_instructions: &'a str,
    pub image_url: Option<&'a str>,
    pub created_by: i64,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Default)]
pub struct CatPatch<'a> {
    pub name: Option<&'a str>,
    pub origin: Option<&'a str>,
    pub description: Option<&'a str>,
    pub care_instructions: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

pub struct DiscussionRow {
    pub id: i64,
    pub cat_id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub parent_id: Option<i64>,
    pub message: String,
    pub deleted_by: Option<String>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AuditRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: String,
    pub created_at: String,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Accepts RFC 3339 as well, for rows written by other tools.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let sqlite = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:00+00:00");

        let rfc = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(rfc, sqlite);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
