//! JWT issuance and verification (HS256).
//!
//! The signing secret is immutable process configuration. To rotate it,
//! deploy the new secret as current with the old one as `previous` (both are
//! accepted, only the new one signs), then drop `previous` once the longest
//! token lifetime has passed. Dropping a secret invalidates every token it
//! signed at once.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use catbase_types::models::{Claims, TokenKind};

use crate::error::TokenFault;
use crate::CoreResult;

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const ISSUER: &str = "catbase";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    previous: Option<DecodingKey>,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand against an explicit clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            previous: None,
            validation,
        }
    }

    /// Also accept tokens signed with `secret` during a rotation window.
    pub fn with_previous_secret(mut self, secret: &[u8]) -> Self {
        self.previous = Some(DecodingKey::from_secret(secret));
        self
    }

    pub fn issue_access(&self, user_id: i64, username: &str, roles: &[String]) -> CoreResult<IssuedToken> {
        self.issue_access_at(user_id, username, roles, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        user_id: i64,
        username: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> CoreResult<IssuedToken> {
        self.sign(TokenKind::Access, user_id, username, roles.to_vec(), now, ACCESS_TOKEN_TTL_SECS)
    }

    /// Refresh tokens never carry roles: roles are looked up again on every
    /// refresh so a demotion takes effect with the next access token.
    pub fn issue_refresh(&self, user_id: i64, username: &str) -> CoreResult<IssuedToken> {
        self.issue_refresh_at(user_id, username, Utc::now())
    }

    pub fn issue_refresh_at(&self, user_id: i64, username: &str, now: DateTime<Utc>) -> CoreResult<IssuedToken> {
        self.sign(TokenKind::Refresh, user_id, username, Vec::new(), now, REFRESH_TOKEN_TTL_SECS)
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenFault> {
        self.verify_at(token, kind, Utc::now())
    }

    /// Accepts the token strictly before its `exp` instant.
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<Claims, TokenFault> {
        let claims = match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => match &self.previous {
                Some(previous) => {
                    decode::<Claims>(token, previous, &self.validation)
                        .map_err(classify)?
                        .claims
                }
                None => return Err(TokenFault::InvalidSignature),
            },
            Err(e) => return Err(classify(e)),
        };

        if claims.kind != kind {
            return Err(TokenFault::MalformedToken);
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenFault::Expired);
        }
        Ok(claims)
    }

    fn sign(
        &self,
        kind: TokenKind,
        user_id: i64,
        username: &str,
        roles: Vec<String>,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> CoreResult<IssuedToken> {
        let expires_at = (now + Duration::seconds(ttl_secs)).timestamp();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            roles,
            kind,
            jti: Uuid::new_v4(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("jwt encode: {e}"))?;

        Ok(IssuedToken { token, expires_at })
    }
}

fn classify(e: JwtError) -> TokenFault {
    match e.kind() {
        ErrorKind::InvalidSignature => TokenFault::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenFault::Expired,
        _ => TokenFault::MalformedToken,
    }
}
