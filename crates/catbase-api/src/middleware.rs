use axum::{
    Extension,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use catbase_core::CoreError;
use catbase_types::models::{Actor, ROLE_ADMIN};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Caller on routes where signing in is optional.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Actor>);

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.user_id)
    }
}

fn bearer(req: &Request) -> Option<Result<&str, ApiError>> {
    let value = req.headers().get(header::AUTHORIZATION)?;
    Some(
        value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingToken),
    )
}

/// Extract and validate the access token from the Authorization header.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> ApiResult<Response> {
    let token = bearer(&req).ok_or(ApiError::MissingToken)??;
    let actor = state.sessions.authenticate(token)?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Like [`require_auth`], but a missing header yields an anonymous viewer.
/// A header that is present must still carry a valid token.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> ApiResult<Response> {
    let actor = match bearer(&req) {
        None => None,
        Some(token) => Some(state.sessions.authenticate(token?)?),
    };

    req.extensions_mut().insert(Viewer(actor));
    Ok(next.run(req).await)
}

/// Coarse role gate from token claims. Runs after [`require_auth`]; the
/// handlers still check permissions against the store.
pub async fn require_admin(Extension(actor): Extension<Actor>, req: Request, next: Next) -> ApiResult<Response> {
    if !actor.has_role(ROLE_ADMIN) {
        return Err(CoreError::Forbidden("admin role required").into());
    }
    Ok(next.run(req).await)
}
