use anyhow::Result;
use catbase_types::models::DeletedBy;
use rusqlite::{Connection, Row};

use crate::models::DiscussionRow;
use crate::{Database, OptionalExt};

const DISCUSSION_COLUMNS: &str = "d.id, d.cat_id, d.user_id, u.username, d.parent_id, d.message,
     d.deleted_by, d.like_count, d.dislike_count, d.reply_count, d.created_at, d.updated_at";

/// Outcome of inserting a comment. Every check runs inside the same write
/// transaction as the insert and the counter bumps.
pub enum NewDiscussion {
    Created(DiscussionRow),
    CatMissing,
    ParentMissing,
    /// Parent belongs to a different catalog entry.
    ParentElsewhere,
    /// Parent is itself a reply; threads are one level deep.
    ParentIsReply,
}

impl Database {
    pub fn insert_discussion(
        &self,
        cat_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        message: &str,
    ) -> Result<NewDiscussion> {
        self.with_tx(|tx| {
            let cat_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM cat_breeds WHERE id = ?1)",
                [cat_id],
                |row| row.get(0),
            )?;
            if !cat_exists {
                return Ok(NewDiscussion::CatMissing);
            }

            if let Some(pid) = parent_id {
                let parent: Option<(i64, Option<i64>)> = tx
                    .query_row(
                        "SELECT cat_id, parent_id FROM discussions WHERE id = ?1",
                        [pid],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                match parent {
                    None => return Ok(NewDiscussion::ParentMissing),
                    Some((parent_cat, _)) if parent_cat != cat_id => {
                        return Ok(NewDiscussion::ParentElsewhere);
                    }
                    Some((_, Some(_))) => return Ok(NewDiscussion::ParentIsReply),
                    Some(_) => {}
                }
            }

            tx.execute(
                "INSERT INTO discussions (cat_id, user_id, parent_id, message) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![cat_id, user_id, parent_id, message],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(pid) = parent_id {
                tx.execute(
                    "UPDATE discussions SET reply_count = reply_count + 1 WHERE id = ?1",
                    [pid],
                )?;
            }
            tx.execute(
                "UPDATE cat_breeds SET discussion_count = discussion_count + 1 WHERE id = ?1",
                [cat_id],
            )?;

            let row = query_discussion(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Discussion {} vanished after insert", id))?;
            Ok(NewDiscussion::Created(row))
        })
    }

    pub fn get_discussion(&self, id: i64) -> Result<Option<DiscussionRow>> {
        self.with_conn(|conn| query_discussion(conn, id))
    }

    /// Rewrites the message if `author_id` owns the comment and it is still
    /// active. Returns rows affected.
    pub fn update_discussion_message(&self, id: i64, author_id: i64, message: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE discussions SET message = ?3, updated_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2 AND deleted_by IS NULL",
                rusqlite::params![id, author_id, message],
            )?)
        })
    }

    /// Redacts an active comment in place. The row, its replies and every
    /// reply counter stay as they are. Returns rows affected (0 if the
    /// comment was already deleted or does not exist).
    pub fn soft_delete_discussion(&self, id: i64, by: DeletedBy) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE discussions
                 SET message = ?2, deleted_by = ?3, updated_at = datetime('now')
                 WHERE id = ?1 AND deleted_by IS NULL",
                rusqlite::params![id, by.redaction(), by.as_str()],
            )?)
        })
    }

    /// Top-level comments for a catalog entry, newest first.
    pub fn list_top_level_discussions(&self, cat_id: i64, limit: u32, offset: u32) -> Result<Vec<DiscussionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DISCUSSION_COLUMNS}
                 FROM discussions d
                 LEFT JOIN users u ON d.user_id = u.id
                 WHERE d.cat_id = ?1 AND d.parent_id IS NULL
                 ORDER BY d.id DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map((cat_id, limit, offset), discussion_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replies to any of `parent_ids`, oldest first.
    pub fn list_replies(&self, parent_ids: &[i64]) -> Result<Vec<DiscussionRow>> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=parent_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {DISCUSSION_COLUMNS}
                 FROM discussions d
                 LEFT JOIN users u ON d.user_id = u.id
                 WHERE d.parent_id IN ({})
                 ORDER BY d.id ASC",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(parent_ids), discussion_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_discussion(conn: &Connection, id: i64) -> Result<Option<DiscussionRow>> {
    // JOIN users to fetch the author's username in the same query
    let mut stmt = conn.prepare(&format!(
        "SELECT {DISCUSSION_COLUMNS}
         FROM discussions d
         LEFT JOIN users u ON d.user_id = u.id
         WHERE d.id = ?1"
    ))?;
    stmt.query_row([id], discussion_from_row).optional()
}

fn discussion_from_row(row: &Row<'_>) -> rusqlite::Result<DiscussionRow> {
    Ok(DiscussionRow {
        id: row.get(0)?,
        cat_id: row.get(1)?,
        user_id: row.get(2)?,
        author_username: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        parent_id: row.get(4)?,
        message: row.get(5)?,
        deleted_by: row.get(6)?,
        like_count: row.get(7)?,
        dislike_count: row.get(8)?,
        reply_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
