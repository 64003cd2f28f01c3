use anyhow::Result;
use rusqlite::{Connection, Row};

use crate::models::{CatPatch, CatRow, NewCat};
use crate::{Database, OptionalExt};

const CAT_COLUMNS: &str = "id, name, origin, description, care_instructions, image_url,
     like_count, dislike_count, view_count, discussion_count, created_at, updated_at";

impl Database {
    pub fn list_cats(&self, limit: u32, offset: u32) -> Result<Vec<CatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAT_COLUMNS} FROM cat_breeds ORDER BY id ASC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map((limit, offset), cat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_cat(&self, id: i64) -> Result<Option<CatRow>> {
        self.with_conn(|conn| query_cat(conn, id))
    }

    /// Bumps the view counter in place. Returns rows affected (0 if missing).
    pub fn record_cat_view(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("UPDATE cat_breeds SET view_count = view_count + 1 WHERE id = ?1", [id])?)
        })
    }

    pub fn insert_cat(&self, cat: &NewCat<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cat_breeds (name, origin, description, care_instructions, image_url, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    cat.name,
                    cat.origin,
                    cat.description,
                    cat.care_instructions,
                    cat.image_url,
                    cat.created_by
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Updates descriptive fields only; counters are untouched.
    pub fn update_cat(&self, id: i64, patch: &CatPatch<'_>) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE cat_breeds SET
                    name = COALESCE(?2, name),
                    origin = COALESCE(?3, origin),
                    description = COALESCE(?4, description),
                    care_instructions = COALESCE(?5, care_instructions),
                    image_url = COALESCE(?6, image_url),
                    updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.name,
                    patch.origin,
                    patch.description,
                    patch.care_instructions,
                    patch.image_url
                ],
            )?)
        })
    }

    /// Physical delete; reactions and discussions cascade with the row.
    pub fn delete_cat(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM cat_breeds WHERE id = ?1", [id])?))
    }
}

fn query_cat(conn: &Connection, id: i64) -> Result<Option<CatRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {CAT_COLUMNS} FROM cat_breeds WHERE id = ?1"))?;
    stmt.query_row([id], cat_from_row).optional()
}

fn cat_from_row(row: &Row<'_>) -> rusqlite::Result<CatRow> {
    Ok(CatRow {
        id: row.get(0)?,
        name: row.get(1)?,
        origin: row.get(2)?,
        description: row.get(3)?,
        care_instructions: row.get(4)?,
        image_url: row.get(5)?,
        like_count: row.get(6)?,
        dislike_count: row.get(7)?,
        view_count: row.get(8)?,
        discussion_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
