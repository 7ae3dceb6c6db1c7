//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Config, StorageBackend};
use crate::content::{PageService, PostService};
use crate::db;
use crate::file::{FileService, FileStorage, LocalFileStorage};
use crate::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Users, pages and posts.
    store: Arc<dyn DocumentStore>,

    /// Upload handling and asset cleanup.
    files: Arc<FileService>,

    pages: PageService,

    posts: PostService,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Connects to PostgreSQL and runs migrations when `DATABASE_URL` is set;
    /// otherwise data lives in memory for the life of the process.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;

                db::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;

                Arc::new(PgDocumentStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory document store");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let storage = create_file_storage(config).await?;
        info!(scheme = storage.scheme(), "file storage ready");

        Ok(Self::from_parts(config.clone(), store, storage))
    }

    /// Assemble state from already constructed backends.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        let files = Arc::new(FileService::new(storage));
        let pages = PageService::new(store.clone(), files.clone());
        let posts = PostService::new(store.clone(), files.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                files,
                pages,
                posts,
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// Get the file service.
    pub fn files(&self) -> &Arc<FileService> {
        &self.inner.files
    }

    /// Get the page service.
    pub fn pages(&self) -> &PageService {
        &self.inner.pages
    }

    /// Get the post service.
    pub fn posts(&self) -> &PostService {
        &self.inner.posts
    }

    /// Check if the document store is healthy.
    pub async fn store_healthy(&self) -> bool {
        self.inner.store.is_healthy().await
    }
}

async fn create_file_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    match &config.storage {
        StorageBackend::Local => {
            tokio::fs::create_dir_all(&config.uploads_dir)
                .await
                .with_context(|| {
                    format!(
                        "failed to create uploads directory {}",
                        config.uploads_dir.display()
                    )
                })?;
            Ok(Arc::new(LocalFileStorage::new(
                config.uploads_dir.clone(),
                config.files_url.clone(),
            )))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3(s3) => {
            let storage = crate::file::S3FileStorage::new(
                s3.endpoint.as_deref(),
                s3.bucket.clone(),
                s3.prefix.clone(),
                s3.public_url.clone(),
            )
            .await
            .context("failed to initialize S3 storage")?;
            Ok(Arc::new(storage))
        }
    }
}
