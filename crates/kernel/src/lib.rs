//! Folio Kernel Library
//!
//! Ordered page and post collections behind an HTTP API. The main entry
//! point for running the server is the `folio` binary.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

use axum::Router;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::session::SessionLayer;
use crate::state::AppState;

/// Build the application router with every route and middleware layer.
pub fn build_router(state: AppState, sessions: SessionLayer) -> Router {
    let cors = build_cors_layer(state.config());

    let router = Router::new()
        .merge(routes::auth::router())
        .merge(routes::dashboard::router())
        .merge(routes::page::router())
        .merge(routes::post::router())
        .merge(routes::file::router(&state.config().files_url))
        .merge(routes::health::router());

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → CORS → session → routes
    sessions
        .apply(router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
            ])
            .allow_credentials(true)
    }
}
