//! HTTP surface for the catbase service.

pub mod auth;
pub mod cats;
pub mod discussions;
pub mod error;
pub mod middleware;
pub mod reactions;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ApiResult};

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use catbase_core::CoreResult;

use crate::middleware::{optional_auth, require_admin, require_auth};

/// Run a blocking store call off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/cats", get(cats::list_cats))
        .route("/cats/{id}", get(cats::get_cat))
        .route("/cats/{id}/reactions", get(reactions::cat_reactions))
        .route("/cats/{id}/discussions", get(discussions::list_discussions))
        .layer(axum::middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/cats/{id}/react", post(reactions::react_to_cat))
        .route("/discussions", post(discussions::create_discussion))
        .route(
            "/discussions/{id}",
            put(discussions::update_discussion).delete(discussions::delete_discussion),
        )
        .route("/discussions/{id}/react", post(reactions::react_to_discussion))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        .route("/admin/cats", post(cats::create_cat))
        .route("/admin/cats/{id}", put(cats::update_cat).delete(cats::delete_cat))
        .layer(axum::middleware::from_fn(require_admin))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(protected)
        .merge(admin);

    Router::new().nest("/api", api).with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    blocking(move || Ok(state.db.ping()?)).await?;
    Ok(Json(json!({ "status": "ok" })))
}
