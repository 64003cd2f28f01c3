use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use catbase_core::catalog::Catalog;
use catbase_core::discussions::ThreadManager;
use catbase_core::engagement::EngagementEngine;
use catbase_core::session::SessionOrchestrator;
use catbase_core::tokens::{ACCESS_TOKEN_TTL_SECS, TokenIssuer};
use catbase_db::Database;
use catbase_types::api::{LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse};
use catbase_types::models::Actor;

use crate::blocking;
use crate::error::ApiResult;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionOrchestrator,
    pub catalog: Catalog,
    pub engine: EngagementEngine,
    pub threads: ThreadManager,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, issuer: TokenIssuer) -> AppState {
        Arc::new(Self {
            sessions: SessionOrchestrator::new(db.clone(), Arc::new(issuer)),
            catalog: Catalog::new(db.clone()),
            engine: EngagementEngine::new(db.clone()),
            threads: ThreadManager::new(db.clone()),
            db,
        })
    }
}

const TOKEN_TYPE: &str = "Bearer";

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    let session = blocking(move || state.sessions.login(&req.username, &req.password)).await?;

    Ok(Json(LoginResponse {
        user: session.user,
        access_token: session.access.token,
        refresh_token: session.refresh.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: ACCESS_TOKEN_TTL_SECS,
    }))
}

pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> ApiResult<impl IntoResponse> {
    let access = blocking(move || state.sessions.refresh(&req.refresh_token)).await?;

    Ok(Json(RefreshResponse {
        access_token: access.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: ACCESS_TOKEN_TTL_SECS,
    }))
}

/// Always 204, whether or not the token was live.
pub async fn logout(State(state): State<AppState>, Json(req): Json<LogoutRequest>) -> ApiResult<impl IntoResponse> {
    blocking(move || state.sessions.logout(&req.refresh_token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<impl IntoResponse> {
    let user = blocking(move || state.sessions.profile(&actor)).await?;
    Ok(Json(user))
}
