use std::collections::HashMap;

use anyhow::Result;
use catbase_types::models::{ReactionKind, ReactionSummary};
use rusqlite::Connection;
use thiserror::Error;

use crate::{Database, OptionalExt};

/// Anything that can carry reactions and like/dislike counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Cat(i64),
    Discussion(i64),
}

impl Subject {
    pub fn id(self) -> i64 {
        match self {
            Subject::Cat(id) | Subject::Discussion(id) => id,
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            Subject::Cat(_) => "cat",
            Subject::Discussion(_) => "discussion",
        }
    }

    fn table(self) -> &'static str {
        match self {
            Subject::Cat(_) => "cat_breeds",
            Subject::Discussion(_) => "discussions",
        }
    }

    /// SQL expression over the subject row that is true once the subject no
    /// longer accepts reactions.
    fn closed_expr(self) -> &'static str {
        match self {
            Subject::Cat(_) => "0",
            Subject::Discussion(_) => "deleted_by IS NOT NULL",
        }
    }

    fn reaction_table(self) -> &'static str {
        match self {
            Subject::Cat(_) => "cat_reactions",
            Subject::Discussion(_) => "discussion_reactions",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            Subject::Cat(_) => "cat_id",
            Subject::Discussion(_) => "discussion_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStatus {
    Applied(ReactionSummary),
    SubjectMissing,
    /// The subject exists but is soft-deleted.
    SubjectClosed,
    /// A conditional write matched no row: another writer changed the
    /// reaction between our read and our write. Nothing was committed.
    LostRace,
}

#[derive(Debug, Error)]
#[error("reaction row changed underneath the toggle")]
struct LostRace;

/// (like delta, dislike delta) for adding `sign` units of `kind`.
fn delta(kind: ReactionKind, sign: i64) -> (i64, i64) {
    match kind {
        ReactionKind::Like => (sign, 0),
        ReactionKind::Dislike => (0, sign),
    }
}

impl Database {
    /// Apply one toggle as a single transaction:
    /// none -> insert `kind`; same kind -> delete; opposite kind -> switch.
    /// Counter changes are relative deltas applied by SQLite, and the returned
    /// counts are re-read from the subject row after the write.
    pub fn toggle_reaction(&self, subject: Subject, user_id: i64, kind: ReactionKind) -> Result<ToggleStatus> {
        let result = self.with_tx(|tx| {
            let closed: Option<bool> = tx
                .query_row(
                    &format!("SELECT {} FROM {} WHERE id = ?1", subject.closed_expr(), subject.table()),
                    [subject.id()],
                    |row| row.get(0),
                )
                .optional()?;
            match closed {
                None => return Ok(ToggleStatus::SubjectMissing),
                Some(true) => return Ok(ToggleStatus::SubjectClosed),
                Some(false) => {}
            }

            let existing = query_user_reaction(tx, subject, user_id)?;
            let rt = subject.reaction_table();
            let key = subject.key_column();

            let (user_reaction, (likes, dislikes), affected) = match existing {
                None => {
                    let n = tx.execute(
                        &format!(
                            "INSERT INTO {rt} ({key}, user_id, reaction_type) VALUES (?1, ?2, ?3)
                             ON CONFLICT ({key}, user_id) DO NOTHING"
                        ),
                        (subject.id(), user_id, kind.as_str()),
                    )?;
                    (Some(kind), delta(kind, 1), n)
                }
                Some(current) if current == kind => {
                    let n = tx.execute(
                        &format!(
                            "DELETE FROM {rt} WHERE {key} = ?1 AND user_id = ?2 AND reaction_type = ?3"
                        ),
                        (subject.id(), user_id, kind.as_str()),
                    )?;
                    (None, delta(kind, -1), n)
                }
                Some(current) => {
                    let n = tx.execute(
                        &format!(
                            "UPDATE {rt} SET reaction_type = ?3, updated_at = datetime('now')
                             WHERE {key} = ?1 AND user_id = ?2 AND reaction_type = ?4"
                        ),
                        (subject.id(), user_id, kind.as_str(), current.as_str()),
                    )?;
                    let (l_out, d_out) = delta(current, -1);
                    let (l_in, d_in) = delta(kind, 1);
                    (Some(kind), (l_out + l_in, d_out + d_in), n)
                }
            };

            if affected == 0 {
                return Err(LostRace.into());
            }

            let updated = tx.execute(
                &format!(
                    "UPDATE {} SET like_count = like_count + ?2, dislike_count = dislike_count + ?3
                     WHERE id = ?1",
                    subject.table()
                ),
                (subject.id(), likes, dislikes),
            )?;
            if updated == 0 {
                return Err(LostRace.into());
            }

            let (like_count, dislike_count) = query_counts(tx, subject)?.ok_or(LostRace)?;
            Ok(ToggleStatus::Applied(ReactionSummary {
                user_reaction,
                like_count,
                dislike_count,
            }))
        });

        match result {
            Err(e) if e.is::<LostRace>() => Ok(ToggleStatus::LostRace),
            other => other,
        }
    }

    /// Stored counters plus `viewer`'s reaction. `None` if the subject is gone.
    pub fn reaction_summary(&self, subject: Subject, viewer: Option<i64>) -> Result<Option<ReactionSummary>> {
        self.with_conn(|conn| {
            let Some((like_count, dislike_count)) = query_counts(conn, subject)? else {
                return Ok(None);
            };
            let user_reaction = match viewer {
                Some(user_id) => query_user_reaction(conn, subject, user_id)?,
                None => None,
            };
            Ok(Some(ReactionSummary {
                user_reaction,
                like_count,
                dislike_count,
            }))
        })
    }

    /// `user_id`'s reactions on many subjects of the same kind, keyed by subject id.
    pub fn user_reactions(&self, subjects: &[Subject], user_id: i64) -> Result<HashMap<i64, ReactionKind>> {
        let Some(first) = subjects.first() else {
            return Ok(HashMap::new());
        };

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=subjects.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {key}, reaction_type FROM {rt} WHERE user_id = ?1 AND {key} IN ({})",
                placeholders.join(", "),
                key = first.key_column(),
                rt = first.reaction_table(),
            );

            let mut params: Vec<i64> = Vec::with_capacity(subjects.len() + 1);
            params.push(user_id);
            params.extend(subjects.iter().map(|s| s.id()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut out = HashMap::with_capacity(rows.len());
            for (id, raw) in rows {
                out.insert(id, raw.parse::<ReactionKind>()?);
            }
            Ok(out)
        })
    }

    /// Number of reaction rows of `kind` on `subject`, counted from the
    /// reaction table rather than the denormalized counters.
    pub fn count_reaction_rows(&self, subject: Subject, kind: ReactionKind) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND reaction_type = ?2",
                    subject.reaction_table(),
                    subject.key_column()
                ),
                (subject.id(), kind.as_str()),
                |row| row.get(0),
            )?)
        })
    }
}

fn query_user_reaction(conn: &Connection, subject: Subject, user_id: i64) -> Result<Option<ReactionKind>> {
    let raw: Option<String> = conn
        .query_row(
            &format!(
                "SELECT reaction_type FROM {} WHERE {} = ?1 AND user_id = ?2",
                subject.reaction_table(),
                subject.key_column()
            ),
            (subject.id(), user_id),
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw.map(|r| r.parse::<ReactionKind>()).transpose()?)
}

fn query_counts(conn: &Connection, subject: Subject) -> Result<Option<(i64, i64)>> {
    conn.query_row(
        &format!("SELECT like_count, dislike_count FROM {} WHERE id = ?1", subject.table()),
        [subject.id()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}
