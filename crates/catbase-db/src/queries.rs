use crate::models::{AuditRow, UserRow};
use crate::{Database, OptionalExt};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Outcome of [`Database::create_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewUser {
    Created(i64),
    UsernameTaken,
    EmailTaken,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_active, created_at, last_login";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Inserts a user and grants `roles` in one transaction. Username and
    /// email clashes are reported, not raised; an unknown role rolls back.
    pub fn create_account(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        roles: &[&str],
    ) -> Result<NewUser> {
        self.with_tx(|tx| {
            let (name_taken, email_taken): (bool, bool) = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1),
                        EXISTS(SELECT 1 FROM users WHERE email = ?2)",
                (username, email),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            if name_taken {
                return Ok(NewUser::UsernameTaken);
            }
            if email_taken {
                return Ok(NewUser::EmailTaken);
            }

            tx.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            let id = tx.last_insert_rowid();
            for role in roles {
                grant_role_on(tx, id, role)?;
            }
            Ok(NewUser::Created(id))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("UPDATE users SET is_active = ?2 WHERE id = ?1", (id, active))?)
        })
    }

    pub fn touch_last_login(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET last_login = datetime('now') WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Roles & permissions --

    pub fn grant_role(&self, user_id: i64, role: &str) -> Result<()> {
        self.with_conn(|conn| grant_role_on(conn, user_id, role))
    }

    pub fn get_user_roles(&self, user_id: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.name
                 FROM roles r
                 JOIN user_roles ur ON r.id = ur.role_id
                 WHERE ur.user_id = ?1
                 ORDER BY r.name",
            )?;
            let roles = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(roles)
        })
    }

    pub fn user_has_permission(&self, user_id: i64, permission: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let granted = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM permissions p
                    JOIN role_permissions rp ON p.id = rp.permission_id
                    JOIN user_roles ur ON rp.role_id = ur.role_id
                    WHERE ur.user_id = ?1 AND p.name = ?2
                 )",
                (user_id, permission),
                |row| row.get(0),
            )?;
            Ok(granted)
        })
    }

    // -- Refresh tokens --

    pub fn store_refresh_token(&self, user_id: i64, token_hash: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
                (user_id, token_hash, expires_at),
            )?;
            Ok(())
        })
    }

    /// Owner of the token if it exists, is unexpired at `now` and unrevoked.
    pub fn find_valid_refresh_token(&self, token_hash: &str, now: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id
                 FROM refresh_tokens
                 WHERE token_hash = ?1
                   AND expires_at > ?2
                   AND revoked_at IS NULL",
                (token_hash, now),
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Marks the token revoked. Returns the owner when this call did the
    /// revoking, `None` when the token was unknown or already revoked.
    pub fn revoke_refresh_token(&self, token_hash: &str, now: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE refresh_tokens
                 SET revoked_at = ?2
                 WHERE token_hash = ?1 AND revoked_at IS NULL
                 RETURNING user_id",
                (token_hash, now),
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn revoke_user_refresh_tokens(&self, user_id: i64, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE refresh_tokens SET revoked_at = ?2 WHERE user_id = ?1 AND revoked_at IS NULL",
                (user_id, now),
            )?)
        })
    }

    /// Deletes rows that can never validate again.
    pub fn purge_refresh_tokens(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?1 OR revoked_at IS NOT NULL",
                [now],
            )?)
        })
    }

    // -- Audit --

    pub fn insert_audit(
        &self,
        user_id: Option<i64>,
        action: &str,
        resource: &str,
        resource_id: Option<&str>,
        details: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_logs (user_id, action, resource, resource_id, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user_id, action, resource, resource_id, details],
            )?;
            Ok(())
        })
    }

    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, action, resource, resource_id, details, created_at
                 FROM audit_logs
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(AuditRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        action: row.get(2)?,
                        resource: row.get(3)?,
                        resource_id: row.get(4)?,
                        details: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}"))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                is_active: row.get(4)?,
                created_at: row.get(5)?,
                last_login: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn grant_role_on(conn: &Connection, user_id: i64, role: &str) -> Result<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role_id)
         SELECT ?1, id FROM roles WHERE name = ?2",
        (user_id, role),
    )?;
    if inserted == 0 {
        let known: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?1)",
            [role],
            |row| row.get(0),
        )?;
        if !known {
            return Err(anyhow!("Unknown role: {}", role));
        }
    }
    Ok(())
}
