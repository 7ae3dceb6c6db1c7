#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] builds the REAL router and state over in-memory backends: a
//! `MemoryDocumentStore`, `LocalFileStorage` in a temporary directory and
//! in-memory sessions. Every test gets its own app, so tests never share data.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use folio_kernel::config::{Config, StorageBackend};
use folio_kernel::file::LocalFileStorage;
use folio_kernel::session::{CookieSettings, SessionLayer};
use folio_kernel::state::AppState;
use folio_kernel::store::MemoryDocumentStore;
use folio_test_utils::TestUser;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "folio-test-boundary";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryDocumentStore>,
    pub uploads: TempDir,
}

impl TestApp {
    /// Create a new test application.
    pub fn new() -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create uploads dir");

        let config = Config {
            port: 0,
            database_url: None,
            database_max_connections: 1,
            redis_url: None,
            uploads_dir: uploads.path().to_path_buf(),
            files_url: "/files".to_string(),
            storage: StorageBackend::Local,
            cors_allowed_origins: vec!["*".to_string()],
            cookie_same_site: "lax".to_string(),
            cookie_secure: false,
        };

        let store = Arc::new(MemoryDocumentStore::new());
        let storage = Arc::new(LocalFileStorage::new(uploads.path(), "/files"));
        let state = AppState::from_parts(config, store.clone(), storage);

        let sessions = SessionLayer::memory(CookieSettings::new(false, "lax"));
        let router = folio_kernel::build_router(state.clone(), sessions);

        Self {
            router,
            state,
            store,
            uploads,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a JSON request (or an empty one when `body` is `None`) with
    /// optional session cookies; returns the status and parsed JSON body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookies: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if !cookies.is_empty() {
            builder = builder.header(header::COOKIE, cookies);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.request(request).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Sign up a user and return the session cookies.
    pub async fn signup(&self, user: &TestUser) -> String {
        let response = self
            .request(
                Request::post("/api/auth/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(user.signup_json().to_string()))
                    .unwrap(),
            )
            .await;

        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "Signup failed for user '{}'",
            user.username
        );

        extract_cookies(&response)
    }

    /// Create a page over the API and return its JSON.
    pub async fn create_page(&self, cookies: &str, body: Value) -> Value {
        let (status, page) = self
            .json(Method::POST, "/api/pages", Some(body), cookies)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create page failed: {page}");
        page
    }

    /// Create a post on a page over the API and return its JSON.
    pub async fn create_post(&self, cookies: &str, page_id: &str, body: Value) -> Value {
        let (status, post) = self
            .json(
                Method::POST,
                &format!("/api/pages/{page_id}/posts"),
                Some(body),
                cookies,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {post}");
        post
    }

    /// Upload bytes as a multipart form and return status and JSON.
    pub async fn upload(
        &self,
        cookies: &str,
        folder: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let mut request = Request::post("/api/files")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(folder, filename, content_type, data)))
            .unwrap();
        if !cookies.is_empty() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookies.parse().unwrap());
        }

        let response = self.request(request).await;
        let status = response.status();
        (status, response_json(response).await)
    }
}

/// Build a multipart body with a `folder` field and one `file` part.
pub fn multipart_body(folder: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"folder\"\r\n\r\n{folder}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Read a response body as JSON (`Value::Null` when empty or not JSON).
pub async fn response_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Extract Set-Cookie headers from a response for use in subsequent requests.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            // Extract just the cookie name=value, ignoring attributes
            cookie.split(';').next()
        })
        .collect::<Vec<_>>()
        .join("; ")
}
