//! Authentication routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{CreateUser, User};
use crate::routes::helpers::{require_user, start_session};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Info text update body.
#[derive(Debug, Deserialize)]
pub struct InfoTextRequest {
    pub info_text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/me/info", put(update_info_text))
}

/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = User::new_account(&input)?;
    let store = state.store();

    if store.find_user_by_username(&user.username).await?.is_some() {
        return Err(AppError::Conflict("username is already taken".to_string()));
    }
    if store.find_user_by_email(&user.email).await?.is_some() {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }
    store.insert_user(&user).await?;
    start_session(&session, user.id).await?;

    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<User>> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .store()
        .find_user_by_email(&email)
        .await?
        .filter(|u| u.verify_password(&request.password))
        .ok_or(AppError::Unauthorized)?;

    start_session(&session, user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(user))
}

/// POST /api/auth/logout
async fn logout(session: Session) -> AppResult<Json<MessageResponse>> {
    session.delete().await.map_err(|e| {
        tracing::error!(error = %e, "failed to delete session");
        AppError::Internal(anyhow::anyhow!("session error"))
    })?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Logout successful",
    }))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, session: Session) -> AppResult<Json<User>> {
    Ok(Json(require_user(&state, &session).await?))
}

/// PUT /api/me/info
async fn update_info_text(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<InfoTextRequest>,
) -> AppResult<Json<User>> {
    let mut user = require_user(&state, &session).await?;
    if !state
        .store()
        .set_user_info_text(user.id, &request.info_text)
        .await?
    {
        return Err(AppError::NotFound);
    }
    user.info_text = request.info_text;
    Ok(Json(user))
}
