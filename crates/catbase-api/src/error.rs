//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use catbase_core::CoreError;
use catbase_types::api::ErrorBody;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("missing or malformed bearer token")]
    MissingToken,

    #[error("blocking task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Core(e) => match e {
                CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
                CoreError::AccountDisabled => (StatusCode::UNAUTHORIZED, "account_disabled"),
                CoreError::TokenInvalid(_) => (StatusCode::UNAUTHORIZED, "token_invalid"),
                CoreError::TokenRevokedOrUnknown => (StatusCode::UNAUTHORIZED, "token_revoked"),
                CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
                CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                CoreError::ConflictOrRace => (StatusCode::CONFLICT, "conflict"),
                CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        // Storage and runtime detail stays in the log.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self);
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorBody {
            error: code.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catbase_core::TokenFault;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorBody) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_their_source() {
        let err = ApiError::from(CoreError::Internal(anyhow::anyhow!("disk I/O error at /var/lib/catbase.db")));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.message, "internal error");
    }

    #[tokio::test]
    async fn status_categories() {
        let cases = [
            (CoreError::invalid_input("bad"), StatusCode::BAD_REQUEST),
            (CoreError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (CoreError::AccountDisabled, StatusCode::UNAUTHORIZED),
            (CoreError::TokenInvalid(TokenFault::Expired), StatusCode::UNAUTHORIZED),
            (CoreError::TokenRevokedOrUnknown, StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden("cats:write"), StatusCode::FORBIDDEN),
            (CoreError::NotFound("cat"), StatusCode::NOT_FOUND),
            (CoreError::ConflictOrRace, StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            let (status, body) = body_of(err.into()).await;
            assert_eq!(status, expected, "{}", body.error);
        }

        let (status, body) = body_of(CoreError::TokenInvalid(TokenFault::Expired).into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.message, "invalid token: expired");
    }
}
