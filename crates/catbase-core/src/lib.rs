//! Catbase identity and engagement layer.
//!
//! Sessions (password check, access/refresh tokens, revocation), role and
//! permission lookups, the like/dislike toggle engine and the discussion
//! thread manager. Every operation takes already-validated typed input and
//! returns a typed result or a [`CoreError`]; nothing here knows about HTTP.

pub mod accounts;
pub mod audit;
pub mod catalog;
pub mod discussions;
pub mod engagement;
pub mod error;
pub mod password;
pub mod refresh;
pub mod roles;
pub mod session;
pub mod tokens;

pub use catbase_db::reactions::Subject;
pub use error::{CoreError, CoreResult, TokenFault};

use catbase_db::models::parse_timestamp;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Stored timestamp to UTC, logging and defaulting on corrupt values.
pub(crate) fn timestamp(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}' on row {}", what, raw, id);
        DateTime::default()
    })
}
