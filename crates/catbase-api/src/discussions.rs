use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use catbase_types::api::{CreateDiscussionRequest, ListResponse, PageQuery, UpdateDiscussionRequest};
use catbase_types::models::Actor;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::middleware::Viewer;

/// Newest top-level comments first, replies nested oldest first.
pub async fn list_discussions(
    State(state): State<AppState>,
    Path(cat_id): Path<i64>,
    Query(page): Query<PageQuery>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<impl IntoResponse> {
    let threads =
        blocking(move || state.threads.list(cat_id, viewer.user_id(), page.limit, page.offset)).await?;
    Ok(Json(ListResponse::new(threads)))
}

pub async fn create_discussion(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateDiscussionRequest>,
) -> ApiResult<impl IntoResponse> {
    let discussion =
        blocking(move || state.threads.create(&actor, req.cat_id, req.parent_id, &req.message)).await?;
    Ok((StatusCode::CREATED, Json(discussion)))
}

pub async fn update_discussion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateDiscussionRequest>,
) -> ApiResult<impl IntoResponse> {
    let discussion = blocking(move || state.threads.edit(&actor, id, &req.message)).await?;
    Ok(Json(discussion))
}

/// Returns the redacted comment. Repeating the call returns the same state.
pub async fn delete_discussion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let discussion = blocking(move || state.threads.delete(&actor, id)).await?;
    Ok(Json(discussion))
}
