//! Comment threads under catalog entries.
//!
//! A comment is Active until it is deleted, and Deleted is terminal. Threads are
//! one level deep: replies attach to top-level comments only. Reply counters
//! count every reply ever posted and are never decremented.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use catbase_db::Database;
use catbase_db::discussions::NewDiscussion;
use catbase_db::models::DiscussionRow;
use catbase_db::reactions::Subject;
use catbase_types::models::{Actor, DeletedBy, Discussion, DiscussionState, ReactionKind, ReactionSummary};

use crate::audit::AuditLog;
use crate::engagement::EngagementEngine;
use crate::catalog::MAX_PAGE_SIZE;
use crate::roles::{PERM_DISCUSSIONS_MODERATE, RoleEvaluator};
use crate::{CoreError, CoreResult, timestamp};

pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Top-level comments per page when the caller does not ask.
pub const DISCUSSION_PAGE_SIZE: u32 = 20;

/// Trimmed message, or why it is unacceptable.
fn clean_message(raw: &str) -> CoreResult<&str> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(CoreError::invalid_input("message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::invalid_input(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(message)
}

fn state_of(row: &DiscussionRow) -> DiscussionState {
    match row.deleted_by.as_deref() {
        None => DiscussionState::Active,
        Some(raw) => match raw.parse::<DeletedBy>() {
            Ok(by) => DiscussionState::Deleted { by },
            Err(e) => {
                warn!("Corrupt deleted_by on discussion {}: {}", row.id, e);
                DiscussionState::Deleted { by: DeletedBy::Moderator }
            }
        },
    }
}

fn to_discussion(row: DiscussionRow, user_reaction: Option<ReactionKind>) -> Discussion {
    let state = state_of(&row);
    Discussion {
        created_at: timestamp(&row.created_at, "created_at", row.id),
        updated_at: timestamp(&row.updated_at, "updated_at", row.id),
        id: row.id,
        cat_id: row.cat_id,
        author_id: row.user_id,
        author_username: row.author_username,
        parent_id: row.parent_id,
        message: row.message,
        state,
        like_count: row.like_count,
        dislike_count: row.dislike_count,
        reply_count: row.reply_count,
        user_reaction,
        replies: Vec::new(),
    }
}

#[derive(Clone)]
pub struct ThreadManager {
    db: Arc<Database>,
    engine: EngagementEngine,
    roles: RoleEvaluator,
    audit: AuditLog,
}

impl ThreadManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            engine: EngagementEngine::new(db.clone()),
            roles: RoleEvaluator::new(db.clone()),
            audit: AuditLog::new(db.clone()),
            db,
        }
    }

    pub fn create(&self, actor: &Actor, cat_id: i64, parent_id: Option<i64>, message: &str) -> CoreResult<Discussion> {
        let message = clean_message(message)?;

        let row = match self.db.insert_discussion(cat_id, actor.user_id, parent_id, message)? {
            NewDiscussion::Created(row) => row,
            NewDiscussion::CatMissing => return Err(CoreError::NotFound("cat")),
            NewDiscussion::ParentMissing => return Err(CoreError::NotFound("parent discussion")),
            NewDiscussion::ParentElsewhere => {
                return Err(CoreError::invalid_input("parent belongs to a different cat"));
            }
            NewDiscussion::ParentIsReply => {
                return Err(CoreError::invalid_input("replies to replies are not allowed"));
            }
        };

        self.audit.record(
            Some(actor.user_id),
            "discussion.create",
            "discussion",
            Some(row.id),
            json!({ "cat_id": cat_id, "parent_id": parent_id }),
        );
        info!(discussion_id = row.id, cat_id, user_id = actor.user_id, "Discussion created");
        Ok(to_discussion(row, None))
    }

    pub fn edit(&self, actor: &Actor, id: i64, message: &str) -> CoreResult<Discussion> {
        let message = clean_message(message)?;
        let row = self.load(id)?;

        if row.user_id != actor.user_id {
            return Err(CoreError::Forbidden("only the author can edit a comment"));
        }
        if row.deleted_by.is_some() {
            return Err(CoreError::invalid_input("deleted comments cannot be edited"));
        }

        if self.db.update_discussion_message(id, actor.user_id, message)? == 0 {
            // Deleted between our read and our write.
            return Err(CoreError::ConflictOrRace);
        }

        self.audit
            .record(Some(actor.user_id), "discussion.edit", "discussion", Some(id), json!({}));
        self.get(id, Some(actor.user_id))
    }

    /// Author delete or moderator delete. Already-deleted comments are
    /// returned as they are.
    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<Discussion> {
        let row = self.load(id)?;

        let by = if row.user_id == actor.user_id {
            DeletedBy::Author
        } else if actor.is_moderator() && self.roles.has_permission(actor.user_id, PERM_DISCUSSIONS_MODERATE)? {
            DeletedBy::Moderator
        } else {
            return Err(CoreError::Forbidden("only the author or a moderator can delete a comment"));
        };

        if row.deleted_by.is_some() {
            return Ok(to_discussion(row, None));
        }

        if self.db.soft_delete_discussion(id, by)? > 0 {
            self.audit.record(
                Some(actor.user_id),
                "discussion.delete",
                "discussion",
                Some(id),
                json!({ "by": by.as_str() }),
            );
            info!(discussion_id = id, user_id = actor.user_id, by = by.as_str(), "Discussion deleted");
        }
        self.get(id, Some(actor.user_id))
    }

    /// Deleted comments refuse reactions; the check and the write share one
    /// transaction.
    pub fn react(&self, actor: &Actor, id: i64, kind: ReactionKind) -> CoreResult<ReactionSummary> {
        self.engine.toggle(Subject::Discussion(id), actor.user_id, kind)
    }

    pub fn get(&self, id: i64, viewer: Option<i64>) -> CoreResult<Discussion> {
        let row = self.load(id)?;
        let user_reaction = match viewer {
            Some(user_id) => self
                .db
                .user_reactions(&[Subject::Discussion(id)], user_id)?
                .remove(&id),
            None => None,
        };
        Ok(to_discussion(row, user_reaction))
    }

    /// Top-level comments newest first, each with its replies oldest first.
    pub fn list(
        &self,
        cat_id: i64,
        viewer: Option<i64>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoreResult<Vec<Discussion>> {
        if self.db.get_cat(cat_id)?.is_none() {
            return Err(CoreError::NotFound("cat"));
        }

        let limit = limit.unwrap_or(DISCUSSION_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let top = self.db.list_top_level_discussions(cat_id, limit, offset.unwrap_or(0))?;
        let top_ids: Vec<i64> = top.iter().map(|d| d.id).collect();
        let replies = self.db.list_replies(&top_ids)?;

        let mut reactions = match viewer {
            Some(user_id) => {
                let subjects: Vec<Subject> = top
                    .iter()
                    .chain(replies.iter())
                    .map(|d| Subject::Discussion(d.id))
                    .collect();
                self.db.user_reactions(&subjects, user_id)?
            }
            None => HashMap::new(),
        };

        let mut by_parent: HashMap<i64, Vec<Discussion>> = HashMap::new();
        for row in replies {
            let Some(parent_id) = row.parent_id else { continue };
            let reaction = reactions.remove(&row.id);
            by_parent.entry(parent_id).or_default().push(to_discussion(row, reaction));
        }

        Ok(top
            .into_iter()
            .map(|row| {
                let id = row.id;
                let reaction = reactions.remove(&id);
                let mut discussion = to_discussion(row, reaction);
                discussion.replies = by_parent.remove(&id).unwrap_or_default();
                discussion
            })
            .collect())
    }

    fn load(&self, id: i64) -> CoreResult<DiscussionRow> {
        self.db.get_discussion(id)?.ok_or(CoreError::NotFound("discussion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catbase_db::models::NewCat;
    use catbase_types::models::{ROLE_MODERATOR, ROLE_USER};

    struct Fixture {
        threads: ThreadManager,
        db: Arc<Database>,
        cat: i64,
        alice: Actor,
        bob: Actor,
        moderator: Actor,
    }

    fn actor(db: &Database, name: &str, role: &str) -> Actor {
        let id = db.create_user(name, &format!("{name}@example.com"), "hash").unwrap();
        db.grant_role(id, role).unwrap();
        Actor {
            user_id: id,
            username: name.to_string(),
            roles: vec![role.to_string()],
        }
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let alice = actor(&db, "alice", ROLE_USER);
        let bob = actor(&db, "bob", ROLE_USER);
        let moderator = actor(&db, "mod", ROLE_MODERATOR);
        let cat = db
            .insert_cat(&NewCat {
                name: "Persian",
                origin: "Iran",
                description: "",
                care_instructions: "",
                image_url: None,
                created_by: alice.user_id,
            })
            .unwrap();
        Fixture {
            threads: ThreadManager::new(db.clone()),
            db,
            cat,
            alice,
            bob,
            moderator,
        }
    }

    #[test]
    fn messages_are_trimmed_and_bounded() {
        let f = fixture();
        let d = f.threads.create(&f.alice, f.cat, None, "  hello  ").unwrap();
        assert_eq!(d.message, "hello");
        assert_eq!(d.state, DiscussionState::Active);

        assert!(matches!(
            f.threads.create(&f.alice, f.cat, None, "   "),
            Err(CoreError::InvalidInput(_))
        ));
        let long = "é".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            f.threads.create(&f.alice, f.cat, None, &long),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(f.threads.create(&f.alice, f.cat, None, &"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
    }

    #[test]
    fn replies_nest_one_level() {
        let f = fixture();
        let top = f.threads.create(&f.alice, f.cat, None, "top").unwrap();
        let reply = f.threads.create(&f.bob, f.cat, Some(top.id), "reply").unwrap();

        assert!(matches!(
            f.threads.create(&f.alice, f.cat, Some(reply.id), "deeper"),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            f.threads.create(&f.alice, f.cat, Some(9999), "orphan"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            f.threads.create(&f.alice, f.cat + 1, None, "nowhere"),
            Err(CoreError::NotFound("cat"))
        ));
        assert_eq!(f.threads.get(top.id, None).unwrap().reply_count, 1);
    }

    #[test]
    fn only_author_edits_and_deleted_is_final() {
        let f = fixture();
        let d = f.threads.create(&f.alice, f.cat, None, "typo").unwrap();

        assert!(matches!(f.threads.edit(&f.bob, d.id, "hijack"), Err(CoreError::Forbidden(_))));
        // Moderators may delete but not rewrite.
        assert!(matches!(f.threads.edit(&f.moderator, d.id, "nope"), Err(CoreError::Forbidden(_))));

        let edited = f.threads.edit(&f.alice, d.id, "fixed").unwrap();
        assert_eq!(edited.message, "fixed");

        f.threads.delete(&f.alice, d.id).unwrap();
        assert!(matches!(f.threads.edit(&f.alice, d.id, "again"), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn delete_redacts_by_role() {
        let f = fixture();
        let mine = f.threads.create(&f.alice, f.cat, None, "mine").unwrap();
        let theirs = f.threads.create(&f.bob, f.cat, None, "spam").unwrap();

        assert!(matches!(f.threads.delete(&f.alice, theirs.id), Err(CoreError::Forbidden(_))));

        let by_author = f.threads.delete(&f.alice, mine.id).unwrap();
        assert_eq!(by_author.message, "[deleted by author]");
        assert_eq!(by_author.state, DiscussionState::Deleted { by: DeletedBy::Author });

        let by_mod = f.threads.delete(&f.moderator, theirs.id).unwrap();
        assert_eq!(by_mod.message, "[deleted by moderator]");

        // Repeat delete is a no-op that reports the existing state.
        let again = f.threads.delete(&f.bob, theirs.id).unwrap();
        assert_eq!(again.state, DiscussionState::Deleted { by: DeletedBy::Moderator });
    }

    #[test]
    fn demoted_moderator_cannot_delete_with_stale_token() {
        let f = fixture();
        let d = f.threads.create(&f.alice, f.cat, None, "hi").unwrap();
        f.db
            .with_conn(|conn| {
                conn.execute("DELETE FROM user_roles WHERE user_id = ?1", [f.moderator.user_id])?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(f.threads.delete(&f.moderator, d.id), Err(CoreError::Forbidden(_))));
    }

    #[test]
    fn deleting_never_decrements_reply_counts() {
        let f = fixture();
        let top = f.threads.create(&f.alice, f.cat, None, "top").unwrap();
        let r1 = f.threads.create(&f.bob, f.cat, Some(top.id), "r1").unwrap();
        f.threads.create(&f.alice, f.cat, Some(top.id), "r2").unwrap();

        f.threads.delete(&f.bob, r1.id).unwrap();
        assert_eq!(f.threads.get(top.id, None).unwrap().reply_count, 2);

        f.threads.delete(&f.alice, top.id).unwrap();
        let listed = f.threads.list(f.cat, None, Some(10), None).unwrap();
        assert_eq!(listed[0].replies.len(), 2);
        assert_eq!(listed[0].replies[0].state, DiscussionState::Deleted { by: DeletedBy::Author });
        assert_eq!(listed[0].replies[1].message, "r2");
        assert_eq!(f.db.get_cat(f.cat).unwrap().unwrap().discussion_count, 3);
    }

    #[test]
    fn reactions_on_comments() {
        let f = fixture();
        let d = f.threads.create(&f.alice, f.cat, None, "nice cat").unwrap();

        let s = f.threads.react(&f.bob, d.id, ReactionKind::Like).unwrap();
        assert_eq!((s.like_count, s.user_reaction), (1, Some(ReactionKind::Like)));
        assert_eq!(f.threads.get(d.id, Some(f.bob.user_id)).unwrap().user_reaction, Some(ReactionKind::Like));
        assert_eq!(f.threads.get(d.id, Some(f.alice.user_id)).unwrap().user_reaction, None);

        f.threads.delete(&f.alice, d.id).unwrap();
        assert!(matches!(
            f.threads.react(&f.bob, d.id, ReactionKind::Dislike),
            Err(CoreError::InvalidInput(_))
        ));
        let after = f.threads.get(d.id, Some(f.bob.user_id)).unwrap();
        assert_eq!((after.like_count, after.dislike_count), (1, 0));
        assert_eq!(after.user_reaction, Some(ReactionKind::Like));

        assert!(matches!(
            f.threads.react(&f.bob, d.id + 100, ReactionKind::Like),
            Err(CoreError::NotFound("discussion"))
        ));
    }

    #[test]
    fn list_orders_and_personalises() {
        let f = fixture();
        let older = f.threads.create(&f.alice, f.cat, None, "older").unwrap();
        let newer = f.threads.create(&f.bob, f.cat, None, "newer").unwrap();
        let reply = f.threads.create(&f.bob, f.cat, Some(older.id), "reply").unwrap();
        f.threads.react(&f.alice, reply.id, ReactionKind::Dislike).unwrap();

        let listed = f.threads.list(f.cat, Some(f.alice.user_id), Some(10), None).unwrap();
        let ids: Vec<i64> = listed.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(listed[1].replies[0].user_reaction, Some(ReactionKind::Dislike));

        let page = f.threads.list(f.cat, None, Some(1), Some(1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, older.id);
        assert_eq!(page[0].replies[0].user_reaction, None);

        assert!(matches!(f.threads.list(f.cat + 1, None, None, None), Err(CoreError::NotFound("cat"))));
    }

    #[test]
    fn list_defaults_to_twenty_top_level_comments() {
        let f = fixture();
        for i in 0..25 {
            f.threads.create(&f.alice, f.cat, None, &format!("comment {i}")).unwrap();
        }

        assert_eq!(f.threads.list(f.cat, None, None, None).unwrap().len(), DISCUSSION_PAGE_SIZE as usize);
        assert_eq!(f.threads.list(f.cat, None, None, Some(20)).unwrap().len(), 5);
        assert_eq!(f.threads.list(f.cat, None, Some(0), None).unwrap().len(), 1);
    }
}
