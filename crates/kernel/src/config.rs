//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where uploaded assets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local filesystem under `uploads_dir`.
    Local,
    /// S3-compatible bucket.
    #[cfg(feature = "s3")]
    S3(S3Config),
}

/// S3 connection settings.
#[cfg(feature = "s3")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO etc.).
    pub endpoint: Option<String>,
    /// Base URL objects are served from.
    pub public_url: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When unset, an in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Redis connection URL. When unset, sessions are kept in memory.
    pub redis_url: Option<String>,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// Asset storage backend (default: local).
    pub storage: StorageBackend,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Send session cookies only over HTTPS (default: true).
    pub cookie_secure: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = non_empty_var("DATABASE_URL");

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let redis_url = non_empty_var("REDIS_URL");

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let storage = storage_from_env()?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let cookie_secure = env::var("COOKIE_SECURE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .context("COOKIE_SECURE must be true or false")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            redis_url,
            uploads_dir,
            files_url,
            storage,
            cors_allowed_origins,
            cookie_same_site,
            cookie_secure,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(not(feature = "s3"))]
fn storage_from_env() -> Result<StorageBackend> {
    match env::var("STORAGE_BACKEND").as_deref() {
        Err(_) | Ok("local") => Ok(StorageBackend::Local),
        Ok(other) => anyhow::bail!("STORAGE_BACKEND {other:?} requires the s3 feature"),
    }
}

#[cfg(feature = "s3")]
fn storage_from_env() -> Result<StorageBackend> {
    match env::var("STORAGE_BACKEND").as_deref() {
        Err(_) | Ok("local") => Ok(StorageBackend::Local),
        Ok("s3") => {
            let bucket = env::var("S3_BUCKET").context("S3_BUCKET is required for s3 storage")?;
            let public_url = env::var("S3_PUBLIC_URL")
                .unwrap_or_else(|_| format!("https://{bucket}.s3.amazonaws.com"));
            Ok(StorageBackend::S3(S3Config {
                bucket,
                prefix: non_empty_var("S3_PREFIX"),
                endpoint: non_empty_var("S3_ENDPOINT"),
                public_url,
            }))
        }
        Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND {other:?}, expected local or s3"),
    }
}
