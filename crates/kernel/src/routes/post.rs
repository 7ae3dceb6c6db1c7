//! Post management routes.

use axum::extract::{Path, State};
use axum::routing::put;
use axum::{Json, Router};
use tower_sessions::Session;
use uuid::Uuid;

use crate::content::DeleteOutcome;
use crate::error::AppResult;
use crate::models::UpdatePost;
use crate::routes::helpers::{PostView, owned_post, require_user};
use crate::state::AppState;

/// Create the post router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/posts/{id}", put(update_post).delete(delete_post))
}

/// PUT /api/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePost>,
) -> AppResult<Json<PostView>> {
    let user = require_user(&state, &session).await?;
    owned_post(&state, id, user.id).await?;
    let post = state.posts().update_in_scope(id, input).await?;
    Ok(Json(PostView::new(post, state.files())))
}

/// DELETE /api/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteOutcome>> {
    let user = require_user(&state, &session).await?;
    owned_post(&state, id, user.id).await?;
    Ok(Json(state.posts().delete_in_scope(id).await?))
}
