use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// -- Reactions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ReactionKind::Like => ReactionKind::Dislike,
            ReactionKind::Dislike => ReactionKind::Like,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown reaction type '{0}', expected 'like' or 'dislike'")]
pub struct UnknownReaction(pub String);

impl FromStr for ReactionKind {
    type Err = UnknownReaction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(UnknownReaction(other.to_string())),
        }
    }
}

/// Post-toggle (or read-only) view of a subject's reactions.
/// Counts are always the stored counters, never client-side arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub user_reaction: Option<ReactionKind>,
    pub like_count: i64,
    pub dislike_count: i64,
}

// -- Identity --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens. Refresh tokens always
/// carry an empty role list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, as extracted from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_USER: &str = "user";

impl Actor {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Coarse check against the roles embedded in the token.
    pub fn is_moderator(&self) -> bool {
        self.has_role(ROLE_ADMIN) || self.has_role(ROLE_MODERATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

// -- Catalog --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cat {
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
    pub user_reaction: Option<ReactionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Discussions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedBy {
    Author,
    Moderator,
}

impl DeletedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletedBy::Author => "author",
            DeletedBy::Moderator => "moderator",
        }
    }

    /// Text that replaces the message body once deleted.
    pub fn redaction(self) -> &'static str {
        match self {
            DeletedBy::Author => "[deleted by author]",
            DeletedBy::Moderator => "[deleted by moderator]",
        }
    }
}

impl FromStr for DeletedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(DeletedBy::Author),
            "moderator" => Ok(DeletedBy::Moderator),
            other => Err(format!("unknown deleted_by value '{other}'")),
        }
    }
}

/// Comments only move Active -> Deleted; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DiscussionState {
    Active,
    Deleted { by: DeletedBy },
}

impl DiscussionState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DiscussionState::Deleted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: i64,
    pub cat_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub parent_id: Option<i64>,
    pub message: String,
    pub state: DiscussionState,
    pub like_count: i64,
    pub dislike_count: i64,
    pub reply_count: i64,
    pub user_reaction: Option<ReactionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Discussion>,
}
