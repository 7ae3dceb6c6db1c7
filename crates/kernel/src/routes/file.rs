//! File upload and serving routes.

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{Response, StatusCode, header},
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::file::{MAX_FILE_SIZE, UploadResult};
use crate::routes::helpers::require_user;
use crate::state::AppState;

/// Folder used when the form names none.
const DEFAULT_FOLDER: &str = "post-files";

/// Room for multipart boundaries and the non-file fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the file router.
///
/// Locally stored files are served under `files_url` when it is a path;
/// an absolute URL means another server (or a CDN) serves them.
pub fn router(files_url: &str) -> Router<AppState> {
    let router = Router::new().route(
        "/api/files",
        post(upload_file).layer(DefaultBodyLimit::max(MAX_FILE_SIZE + MULTIPART_OVERHEAD)),
    );

    let mount = files_url.trim_end_matches('/');
    if mount.starts_with('/') && mount.len() > 1 {
        router.route(&format!("{mount}/{{*path}}"), get(serve_file))
    } else {
        router
    }
}

/// Upload a file.
///
/// POST /api/files
/// Content-Type: multipart/form-data
///
/// Form fields:
/// - file: The file to upload
/// - folder: page-thumbnails, post-thumbnails or post-files (optional)
async fn upload_file(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResult>)> {
    let user = require_user(&state, &session).await?;

    let mut folder = DEFAULT_FOLDER.to_string();
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "folder" => {
                folder = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid folder field: {e}")))?
                    .trim()
                    .to_string();
            }
            "file" if upload.is_none() => {
                let filename = field.file_name().unwrap_or("file").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "failed to read upload data");
                    AppError::BadRequest("failed to read file data".to_string())
                })?;
                if bytes.len() > MAX_FILE_SIZE {
                    return Err(AppError::PayloadTooLarge(format!(
                        "file too large: {} bytes (max {MAX_FILE_SIZE} bytes)",
                        bytes.len()
                    )));
                }
                upload = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("no file provided".to_string()))?;

    let result = state
        .files()
        .upload(user.id, &folder, &filename, content_type.as_deref(), &data)
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Serve a locally stored file.
async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response<Body> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.contains("..") || path.contains('\0') {
        return not_found();
    }

    let storage = state.files().storage();
    if storage.scheme() != "local" {
        return not_found();
    }

    let data = match storage.read(&format!("local://{path}")).await {
        Ok(data) => data,
        Err(_) => return not_found(),
    };

    let content_type = infer::get(&data)
        .map(|kind| kind.mime_type())
        .unwrap_or_else(|| mime_from_path(path));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(data))
        .unwrap_or_else(|_| not_found())
}

fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::from("Not found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

fn mime_from_path(path: &str) -> &'static str {
    match std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
