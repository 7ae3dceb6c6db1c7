//! Shared route helpers: session access, ownership checks, response views.

use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::file::FileService;
use crate::models::{ContentType, Page, Post, User};
use crate::state::AppState;

/// Session key for user ID.
pub const SESSION_USER_ID: &str = "user_id";

/// The logged-in user's ID, if any.
pub async fn session_user_id(session: &Session) -> Option<Uuid> {
    session.get(SESSION_USER_ID).await.ok().flatten()
}

/// Require an authenticated user.
pub async fn require_user(state: &AppState, session: &Session) -> AppResult<User> {
    let id = session_user_id(session).await.ok_or(AppError::Unauthorized)?;
    state
        .store()
        .find_user_by_id(id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Bind `user_id` to a fresh session ID.
pub async fn start_session(session: &Session, user_id: Uuid) -> AppResult<()> {
    session.cycle_id().await.map_err(|e| {
        tracing::error!(error = %e, "failed to cycle session id");
        AppError::Internal(anyhow::anyhow!("session error"))
    })?;
    session.insert(SESSION_USER_ID, user_id).await.map_err(|e| {
        tracing::error!(error = %e, "failed to insert user_id into session");
        AppError::Internal(anyhow::anyhow!("session error"))
    })
}

/// Load a page the user owns.
///
/// Unknown pages are 404; other users' pages are 403.
pub async fn owned_page(state: &AppState, page_id: Uuid, user_id: Uuid) -> AppResult<Page> {
    let page = state.pages().load(page_id).await?.ok_or(AppError::NotFound)?;
    if page.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(page)
}

/// Load a post whose page the user owns.
pub async fn owned_post(state: &AppState, post_id: Uuid, user_id: Uuid) -> AppResult<Post> {
    let post = state.posts().load(post_id).await?.ok_or(AppError::NotFound)?;
    owned_page(state, post.page_id, user_id).await?;
    Ok(post)
}

/// Page as returned by the API, with resolved asset URLs.
#[derive(Debug, Serialize)]
pub struct PageView {
    #[serde(flatten)]
    pub page: Page,
    pub thumbnail_url: Option<String>,
}

impl PageView {
    pub fn new(page: Page, files: &FileService) -> Self {
        let thumbnail_url = page.thumbnail.as_deref().map(|t| files.public_url(t));
        Self {
            page,
            thumbnail_url,
        }
    }
}

/// Post as returned by the API, with resolved asset URLs.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub thumbnail_url: Option<String>,
    /// Download URL for file posts.
    pub file_url: Option<String>,
}

impl PostView {
    pub fn new(post: Post, files: &FileService) -> Self {
        let thumbnail_url = post.thumbnail.as_deref().map(|t| files.public_url(t));
        let file_url = (post.content_type == ContentType::File && !post.content.is_empty())
            .then(|| files.public_url(&post.content));
        Self {
            post,
            thumbnail_url,
            file_url,
        }
    }
}

/// Convert records into views.
pub fn page_views(pages: Vec<Page>, files: &FileService) -> Vec<PageView> {
    pages.into_iter().map(|p| PageView::new(p, files)).collect()
}

pub fn post_views(posts: Vec<Post>, files: &FileService) -> Vec<PostView> {
    posts.into_iter().map(|p| PostView::new(p, files)).collect()
}
