//! Public dashboard routes.
//!
//! Private pages and their posts are reported as not found to anyone but
//! their owner.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Page, User};
use crate::routes::helpers::{PageView, PostView, page_views, post_views, session_user_id};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub username: String,
    pub info_text: String,
    pub is_owner: bool,
    pub pages: Vec<PageView>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub username: String,
    pub page: PageView,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub username: String,
    pub page: PageView,
    pub post: PostView,
}

/// Create the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/{username}", get(dashboard))
        .route("/api/users/{username}/pages/{slug}", get(page_detail))
        .route(
            "/api/users/{username}/pages/{slug}/posts/{post_slug}",
            get(post_detail),
        )
}

async fn find_owner(state: &AppState, username: &str) -> AppResult<User> {
    state
        .store()
        .find_user_by_username(&username.to_lowercase())
        .await?
        .ok_or(AppError::NotFound)
}

async fn visible_page(
    state: &AppState,
    owner: &User,
    slug: &str,
    viewer: Option<Uuid>,
) -> AppResult<Page> {
    state
        .pages()
        .load_by_slug(owner.id, slug)
        .await?
        .filter(|page| page.visible_to(viewer))
        .ok_or(AppError::NotFound)
}

/// GET /api/users/{username}
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    Path(username): Path<String>,
) -> AppResult<Json<DashboardResponse>> {
    let viewer = session_user_id(&session).await;
    let owner = find_owner(&state, &username).await?;
    let pages = state.pages().list(owner.id, viewer).await?;

    Ok(Json(DashboardResponse {
        is_owner: viewer == Some(owner.id),
        username: owner.username,
        info_text: owner.info_text,
        pages: page_views(pages, state.files()),
    }))
}

/// GET /api/users/{username}/pages/{slug}
async fn page_detail(
    State(state): State<AppState>,
    session: Session,
    Path((username, slug)): Path<(String, String)>,
) -> AppResult<Json<PageResponse>> {
    let viewer = session_user_id(&session).await;
    let owner = find_owner(&state, &username).await?;
    let page = visible_page(&state, &owner, &slug, viewer).await?;
    let posts = state.posts().list(page.id).await?;

    Ok(Json(PageResponse {
        username: owner.username,
        page: PageView::new(page, state.files()),
        posts: post_views(posts, state.files()),
    }))
}

/// GET /api/users/{username}/pages/{slug}/posts/{post_slug}
async fn post_detail(
    State(state): State<AppState>,
    session: Session,
    Path((username, slug, post_slug)): Path<(String, String, String)>,
) -> AppResult<Json<PostResponse>> {
    let viewer = session_user_id(&session).await;
    let owner = find_owner(&state, &username).await?;
    let page = visible_page(&state, &owner, &slug, viewer).await?;
    let post = state
        .posts()
        .load_by_slug(page.id, &post_slug)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(PostResponse {
        username: owner.username,
        page: PageView::new(page, state.files()),
        post: PostView::new(post, state.files()),
    }))
}
