//! Session management.
//!
//! Sessions live in Redis when `REDIS_URL` is configured and in process
//! memory otherwise.

use anyhow::{Context, Result};
use axum::Router;
use fred::prelude::*;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_redis_store::RedisStore;

/// Default session expiry (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Cookie settings applied to every session layer.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieSettings {
    /// Build settings from config values; unknown SameSite values mean strict.
    pub fn new(secure: bool, same_site: &str) -> Self {
        let same_site = match same_site {
            "lax" => SameSite::Lax,
            "none" => SameSite::None,
            _ => SameSite::Strict,
        };
        Self { secure, same_site }
    }
}

/// Session layer over one of the supported stores.
#[derive(Clone)]
pub enum SessionLayer {
    Redis(SessionManagerLayer<RedisStore<Pool>>),
    Memory(SessionManagerLayer<MemoryStore>),
}

impl SessionLayer {
    /// Sessions backed by Redis.
    pub async fn redis(redis_url: &str, cookies: CookieSettings) -> Result<Self> {
        let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

        let pool = Builder::from_config(config)
            .build_pool(1)
            .context("failed to create Redis pool")?;

        pool.init()
            .await
            .context("failed to connect to Redis for sessions")?;

        Ok(SessionLayer::Redis(configure(RedisStore::new(pool), cookies)))
    }

    /// Sessions kept in process memory.
    pub fn memory(cookies: CookieSettings) -> Self {
        SessionLayer::Memory(configure(MemoryStore::default(), cookies))
    }

    /// Wrap `router` with this session layer.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            SessionLayer::Redis(layer) => router.layer(layer),
            SessionLayer::Memory(layer) => router.layer(layer),
        }
    }
}

fn configure<Store: SessionStore + Clone>(store: Store, cookies: CookieSettings) -> SessionManagerLayer<Store> {
    SessionManagerLayer::new(store)
        .with_secure(cookies.secure)
        .with_http_only(true)
        .with_same_site(cookies.same_site)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
}
