use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use catbase_core::{CoreError, Subject};
use catbase_types::api::ToggleReactionRequest;
use catbase_types::models::{Actor, ReactionKind};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::middleware::Viewer;

fn parse_kind(req: &ToggleReactionRequest) -> Result<ReactionKind, CoreError> {
    req.reaction_type
        .parse::<ReactionKind>()
        .map_err(|e| CoreError::invalid_input(e.to_string()))
}

pub async fn cat_reactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<impl IntoResponse> {
    let summary = blocking(move || state.engine.summary(Subject::Cat(id), viewer.user_id())).await?;
    Ok(Json(summary))
}

pub async fn react_to_cat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let kind = parse_kind(&req)?;
    let summary = blocking(move || state.engine.toggle(Subject::Cat(id), actor.user_id, kind)).await?;
    Ok(Json(summary))
}

pub async fn react_to_discussion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let kind = parse_kind(&req)?;
    let summary = blocking(move || state.threads.react(&actor, id, kind)).await?;
    Ok(Json(summary))
}
