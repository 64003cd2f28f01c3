use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenFault {
    #[error("bad signature")]
    InvalidSignature,
    #[error("expired")]
    Expired,
    #[error("malformed token")]
    MalformedToken,
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown user or wrong password; the two are never told apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("invalid token: {0}")]
    TokenInvalid(TokenFault),

    #[error("refresh token revoked or unknown")]
    TokenRevokedOrUnknown,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("concurrent update conflict")]
    ConflictOrRace,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenFault> for CoreError {
    fn from(fault: TokenFault) -> Self {
        CoreError::TokenInvalid(fault)
    }
}

impl CoreError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        CoreError::InvalidInput(reason.into())
    }
}
