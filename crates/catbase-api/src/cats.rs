use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use catbase_types::api::{CreateCatRequest, ListResponse, PageQuery, UpdateCatRequest};
use catbase_types::models::Actor;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::middleware::Viewer;

pub async fn list_cats(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(page): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let cats = blocking(move || state.catalog.list(viewer.user_id(), page.limit, page.offset)).await?;
    Ok(Json(ListResponse::new(cats)))
}

pub async fn get_cat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<impl IntoResponse> {
    let cat = blocking(move || state.catalog.get(id, viewer.user_id())).await?;
    Ok(Json(cat))
}

pub async fn create_cat(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCatRequest>,
) -> ApiResult<impl IntoResponse> {
    let cat = blocking(move || state.catalog.create(&actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(cat)))
}

pub async fn update_cat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateCatRequest>,
) -> ApiResult<impl IntoResponse> {
    let cat = blocking(move || state.catalog.update(&actor, id, &req)).await?;
    Ok(Json(cat))
}

pub async fn delete_cat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || state.catalog.delete(&actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
