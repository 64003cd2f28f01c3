//! Store-backed refresh token bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use catbase_db::Database;

use crate::CoreResult;

/// Refresh tokens are looked up by digest; the bearer string never hits disk.
fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    db: Arc<Database>,
}

impl RefreshTokenStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// `expires_at` is unix seconds.
    pub fn store(&self, user_id: i64, token: &str, expires_at: i64) -> CoreResult<()> {
        self.db.store_refresh_token(user_id, &digest(token), expires_at)?;
        Ok(())
    }

    /// Owning user if the token exists, has not expired and is not revoked.
    pub fn is_valid(&self, token: &str) -> CoreResult<Option<i64>> {
        self.is_valid_at(token, Utc::now())
    }

    pub fn is_valid_at(&self, token: &str, now: DateTime<Utc>) -> CoreResult<Option<i64>> {
        Ok(self.db.find_valid_refresh_token(&digest(token), now.timestamp())?)
    }

    /// Idempotent: unknown and already-revoked tokens are fine. Returns the
    /// owner if this call revoked a live row.
    pub fn revoke(&self, token: &str) -> CoreResult<Option<i64>> {
        self.revoke_at(token, Utc::now())
    }

    pub fn revoke_at(&self, token: &str, now: DateTime<Utc>) -> CoreResult<Option<i64>> {
        let owner = self.db.revoke_refresh_token(&digest(token), now.timestamp())?;
        if owner.is_none() {
            debug!("Revoke requested for unknown or already revoked refresh token");
        }
        Ok(owner)
    }

    /// Revokes every live token of `user_id` (all devices).
    pub fn revoke_all_for(&self, user_id: i64) -> CoreResult<usize> {
        Ok(self.db.revoke_user_refresh_tokens(user_id, Utc::now().timestamp())?)
    }

    /// Optional housekeeping; validity never depends on it.
    pub fn purge_stale(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        Ok(self.db.purge_refresh_tokens(now.timestamp())?)
    }
}
