//! Login, silent refresh and logout.
//!
//! A session is Unauthenticated -> Authenticated(access, refresh) ->
//! Refreshed(access') -> LoggedOut. Logout only stops new access tokens from
//! being minted; access tokens already handed out live until they expire.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use catbase_db::Database;
use catbase_types::models::{Actor, TokenKind, UserInfo};

use crate::audit::AuditLog;
use crate::password::{verify_dummy, verify_password};
use crate::refresh::RefreshTokenStore;
use crate::roles::RoleEvaluator;
use crate::tokens::{IssuedToken, TokenIssuer};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserInfo,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    db: Arc<Database>,
    issuer: Arc<TokenIssuer>,
    refresh_tokens: RefreshTokenStore,
    roles: RoleEvaluator,
    audit: AuditLog,
}

impl SessionOrchestrator {
    pub fn new(db: Arc<Database>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            refresh_tokens: RefreshTokenStore::new(db.clone()),
            roles: RoleEvaluator::new(db.clone()),
            audit: AuditLog::new(db.clone()),
            db,
            issuer,
        }
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    pub fn login(&self, username: &str, password: &str) -> CoreResult<Session> {
        let Some(user) = self.db.get_user_by_username(username)? else {
            verify_dummy(password);
            return Err(CoreError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, password) {
            return Err(CoreError::InvalidCredentials);
        }

        // Only reported once the password has been proven.
        if !user.is_active {
            warn!(user_id = user.id, "Login refused for disabled account");
            return Err(CoreError::AccountDisabled);
        }

        let roles: Vec<String> = self.roles.roles_of(user.id)?.into_iter().collect();
        let access = self.issuer.issue_access(user.id, &user.username, &roles)?;
        let refresh = self.issuer.issue_refresh(user.id, &user.username)?;
        self.refresh_tokens.store(user.id, &refresh.token, refresh.expires_at)?;

        if let Err(e) = self.db.touch_last_login(user.id) {
            warn!(user_id = user.id, "Failed to update last login: {:#}", e);
        }
        self.audit
            .record(Some(user.id), "login", "auth", None, json!({ "username": user.username }));
        info!(user_id = user.id, "User logged in");

        Ok(Session {
            user: UserInfo {
                id: user.id,
                username: user.username,
                email: user.email,
                roles,
            },
            access,
            refresh,
        })
    }

    /// Mints a new access token. The refresh token itself is not rotated.
    pub fn refresh(&self, refresh_token: &str) -> CoreResult<IssuedToken> {
        let claims = self.issuer.verify(refresh_token, TokenKind::Refresh)?;

        let user_id = self
            .refresh_tokens
            .is_valid(refresh_token)?
            .ok_or(CoreError::TokenRevokedOrUnknown)?;
        if user_id != claims.sub {
            warn!(user_id, claimed = claims.sub, "Refresh token owner mismatch");
            return Err(CoreError::TokenRevokedOrUnknown);
        }

        let user = self
            .db
            .get_user_by_id(user_id)?
            .ok_or(CoreError::TokenRevokedOrUnknown)?;
        if !user.is_active {
            return Err(CoreError::AccountDisabled);
        }

        let roles: Vec<String> = self.roles.roles_of(user.id)?.into_iter().collect();
        self.issuer.issue_access(user.id, &user.username, &roles)
    }

    /// Idempotent. Unknown or already revoked tokens are not an error.
    pub fn logout(&self, refresh_token: &str) -> CoreResult<()> {
        if let Some(user_id) = self.refresh_tokens.revoke(refresh_token)? {
            self.audit.record(Some(user_id), "logout", "auth", None, json!({}));
            info!(user_id, "User logged out");
        }
        Ok(())
    }

    /// Access token -> actor. Signature and expiry only; no store lookup.
    pub fn authenticate(&self, access_token: &str) -> CoreResult<Actor> {
        let claims = self.issuer.verify(access_token, TokenKind::Access)?;
        Ok(Actor {
            user_id: claims.sub,
            username: claims.username,
            roles: claims.roles,
        })
    }

    /// Fresh profile for an authenticated actor.
    pub fn profile(&self, actor: &Actor) -> CoreResult<UserInfo> {
        let user = self.db.get_user_by_id(actor.user_id)?.ok_or(CoreError::NotFound("user"))?;
        let roles = self.roles.roles_of(user.id)?.into_iter().collect();
        Ok(UserInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            roles,
        })
    }
}
