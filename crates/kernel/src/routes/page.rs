//! Page management routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use tower_sessions::Session;
use uuid::Uuid;

use crate::content::DeleteOutcome;
use crate::error::AppResult;
use crate::models::{CreatePage, CreatePost, UpdatePage};
use crate::routes::helpers::{PageView, PostView, owned_page, require_user};
use crate::state::AppState;

/// Create the page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages", post(create_page))
        .route("/api/pages/{id}", put(update_page).delete(delete_page))
        .route("/api/pages/{id}/posts", post(create_post))
}

/// POST /api/pages
async fn create_page(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<CreatePage>,
) -> AppResult<(StatusCode, Json<PageView>)> {
    let user = require_user(&state, &session).await?;
    let page = state.pages().create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(PageView::new(page, state.files()))))
}

/// PUT /api/pages/{id}
///
/// Field updates and moves; `order_index` outside `[1, N]` is clamped.
async fn update_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePage>,
) -> AppResult<Json<PageView>> {
    let user = require_user(&state, &session).await?;
    owned_page(&state, id, user.id).await?;
    let page = state.pages().update_in_scope(id, input).await?;
    Ok(Json(PageView::new(page, state.files())))
}

/// DELETE /api/pages/{id}
async fn delete_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteOutcome>> {
    let user = require_user(&state, &session).await?;
    owned_page(&state, id, user.id).await?;
    Ok(Json(state.pages().delete_in_scope(id).await?))
}

/// POST /api/pages/{id}/posts
async fn create_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<CreatePost>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let user = require_user(&state, &session).await?;
    owned_page(&state, id, user.id).await?;
    let post = state.posts().create(id, input).await?;
    Ok((StatusCode::CREATED, Json(PostView::new(post, state.files()))))
}
