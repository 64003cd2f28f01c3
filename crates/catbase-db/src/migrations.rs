use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                last_login      TEXT
            );

            CREATE TABLE roles (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE permissions (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE user_roles (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, role_id)
            );

            CREATE TABLE role_permissions (
                role_id         INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                permission_id   INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
                PRIMARY KEY (role_id, permission_id)
            );

            -- Only a SHA-256 digest of each refresh token is kept.
            -- Timestamps are unix seconds so validity checks compare integers.
            CREATE TABLE refresh_tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash  TEXT NOT NULL UNIQUE,
                expires_at  INTEGER NOT NULL,
                revoked_at  INTEGER,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);

            CREATE TABLE cat_breeds (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name                TEXT NOT NULL,
                origin              TEXT NOT NULL DEFAULT '',
                description         TEXT NOT NULL DEFAULT '',
                care_instructions   TEXT NOT NULL DEFAULT '',
                image_url           TEXT,
                created_by          INTEGER REFERENCES users(id) ON DELETE SET NULL,
                like_count          INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                dislike_count       INTEGER NOT NULL DEFAULT 0 CHECK (dislike_count >= 0),
                view_count          INTEGER NOT NULL DEFAULT 0,
                discussion_count    INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE cat_reactions (
                cat_id          INTEGER NOT NULL REFERENCES cat_breeds(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reaction_type   TEXT NOT NULL CHECK (reaction_type IN ('like', 'dislike')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (cat_id, user_id)
            );

            CREATE TABLE discussions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                cat_id          INTEGER NOT NULL REFERENCES cat_breeds(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                parent_id       INTEGER REFERENCES discussions(id) ON DELETE CASCADE,
                message         TEXT NOT NULL,
                deleted_by      TEXT CHECK (deleted_by IN ('author', 'moderator')),
                like_count      INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                dislike_count   INTEGER NOT NULL DEFAULT 0 CHECK (dislike_count >= 0),
                reply_count     INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_discussions_thread ON discussions(cat_id, parent_id, id);

            CREATE TABLE discussion_reactions (
                discussion_id   INTEGER NOT NULL REFERENCES discussions(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reaction_type   TEXT NOT NULL CHECK (reaction_type IN ('like', 'dislike')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (discussion_id, user_id)
            );

            CREATE TABLE audit_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER,
                action      TEXT NOT NULL,
                resource    TEXT NOT NULL,
                resource_id TEXT,
                details     TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO roles (name) VALUES ('admin'), ('moderator'), ('user');
            INSERT INTO permissions (name) VALUES ('cats:write'), ('discussions:moderate');

            INSERT INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id FROM roles r, permissions p
                WHERE r.name = 'admin';
            INSERT INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id FROM roles r, permissions p
                WHERE r.name = 'moderator' AND p.name = 'discussions:moderate';

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let roles: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(roles, 3);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
