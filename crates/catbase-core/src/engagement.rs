//! Like/dislike toggles on catalog entries and comments.

use std::sync::Arc;

use tracing::{debug, warn};

use catbase_db::Database;
use catbase_db::reactions::{Subject, ToggleStatus};
use catbase_types::models::{ReactionKind, ReactionSummary};

use crate::{CoreError, CoreResult};

/// Attempts per toggle before a lost race is surfaced to the caller.
const TOGGLE_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct EngagementEngine {
    db: Arc<Database>,
}

impl EngagementEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// none -> `kind`, `kind` -> none, opposite -> `kind`. The returned counts
    /// are the stored values after this toggle committed.
    pub fn toggle(&self, subject: Subject, user_id: i64, kind: ReactionKind) -> CoreResult<ReactionSummary> {
        for attempt in 1..=TOGGLE_ATTEMPTS {
            match self.db.toggle_reaction(subject, user_id, kind)? {
                ToggleStatus::Applied(summary) => {
                    debug!(
                        resource = subject.resource(),
                        id = subject.id(),
                        user_id,
                        reaction = ?summary.user_reaction,
                        "Reaction toggled"
                    );
                    return Ok(summary);
                }
                ToggleStatus::SubjectMissing => return Err(CoreError::NotFound(subject.resource())),
                ToggleStatus::SubjectClosed => {
                    return Err(CoreError::invalid_input("deleted comments cannot be reacted to"));
                }
                ToggleStatus::LostRace => {
                    warn!(resource = subject.resource(), id = subject.id(), user_id, attempt, "Toggle lost a race");
                }
            }
        }
        Err(CoreError::ConflictOrRace)
    }

    pub fn summary(&self, subject: Subject, viewer: Option<i64>) -> CoreResult<ReactionSummary> {
        self.db
            .reaction_summary(subject, viewer)?
            .ok_or(CoreError::NotFound(subject.resource()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (EngagementEngine, Arc<Database>, Vec<i64>, i64) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let users = (0..3)
            .map(|i| db.create_user(&format!("user{i}"), &format!("user{i}@example.com"), "hash").unwrap())
            .collect();
        let cat = db
            .with_conn(|conn| {
                conn.execute("INSERT INTO cat_breeds (name) VALUES ('Bengal')", [])?;
                Ok(conn.last_insert_rowid())
            })
            .unwrap();
        (EngagementEngine::new(db.clone()), db, users, cat)
    }

    #[test]
    fn like_twice_restores_original_counts() {
        let (engine, _, users, cat) = setup();
        let subject = Subject::Cat(cat);
        let before = engine.summary(subject, Some(users[0])).unwrap();

        engine.toggle(subject, users[0], ReactionKind::Like).unwrap();
        let after = engine.toggle(subject, users[0], ReactionKind::Like).unwrap();

        assert_eq!(after, before);
        assert_eq!(after.user_reaction, None);
    }

    #[test]
    fn switching_moves_exactly_one_unit() {
        let (engine, _, users, cat) = setup();
        let subject = Subject::Cat(cat);
        engine.toggle(subject, users[1], ReactionKind::Like).unwrap();
        engine.toggle(subject, users[0], ReactionKind::Like).unwrap();

        let switched = engine.toggle(subject, users[0], ReactionKind::Dislike).unwrap();
        assert_eq!(switched.user_reaction, Some(ReactionKind::Dislike));
        assert_eq!((switched.like_count, switched.dislike_count), (1, 1));
    }

    #[test]
    fn counters_match_rows_across_actors() {
        let (engine, db, users, cat) = setup();
        let subject = Subject::Cat(cat);
        let script = [
            (0, ReactionKind::Like),
            (1, ReactionKind::Dislike),
            (2, ReactionKind::Like),
            (1, ReactionKind::Like),
            (0, ReactionKind::Like),
            (2, ReactionKind::Dislike),
        ];
        for (who, kind) in script {
            engine.toggle(subject, users[who], kind).unwrap();
        }

        let summary = engine.summary(subject, None).unwrap();
        assert_eq!(summary.like_count, db.count_reaction_rows(subject, ReactionKind::Like).unwrap());
        assert_eq!(summary.dislike_count, db.count_reaction_rows(subject, ReactionKind::Dislike).unwrap());
        assert_eq!((summary.like_count, summary.dislike_count), (1, 1));
    }

    #[test]
    fn lost_race_is_retried_once_then_reported() {
        let (engine, db, users, cat) = setup();
        let subject = Subject::Cat(cat);
        // Every counter update silently matches nothing, as if the row
        // changed under each attempt.
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER stall_counters BEFORE UPDATE ON cat_breeds
                 BEGIN SELECT RAISE(IGNORE); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            engine.toggle(subject, users[0], ReactionKind::Like),
            Err(CoreError::ConflictOrRace)
        ));
        assert_eq!(db.count_reaction_rows(subject, ReactionKind::Like).unwrap(), 0);
        assert_eq!(db.user_reactions(&[subject], users[0]).unwrap().len(), 0);

        db.with_conn(|conn| {
            conn.execute_batch("DROP TRIGGER stall_counters;")?;
            Ok(())
        })
        .unwrap();
        let summary = engine.toggle(subject, users[0], ReactionKind::Like).unwrap();
        assert_eq!((summary.user_reaction, summary.like_count), (Some(ReactionKind::Like), 1));
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let (engine, _, users, _) = setup();
        assert!(matches!(
            engine.toggle(Subject::Discussion(42), users[0], ReactionKind::Like),
            Err(CoreError::NotFound("discussion"))
        ));
        assert!(matches!(engine.summary(Subject::Cat(42), None), Err(CoreError::NotFound("cat"))));
    }
}
