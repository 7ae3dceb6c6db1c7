//! Object storage backends.
//!
//! Assets are addressed by scheme-prefixed URIs (`local://...`, `s3://...`).
//! Pages and posts store these URIs; the public URL is derived on output.
//! The second path segment of every generated URI is the uploader's user ID.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Object storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data to storage at the given URI.
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()>;

    /// Read data from storage at the given URI.
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;

    /// Delete an object from storage.
    async fn delete(&self, uri: &str) -> Result<()>;

    /// Check if an object exists.
    async fn exists(&self, uri: &str) -> Result<bool>;

    /// Get the public URL for an object.
    fn public_url(&self, uri: &str) -> String;

    /// Get the storage scheme (e.g., "local", "s3").
    fn scheme(&self) -> &'static str;

    /// Whether `uri` addresses this backend.
    fn owns(&self, uri: &str) -> bool {
        uri.strip_prefix(self.scheme())
            .is_some_and(|rest| rest.starts_with("://"))
    }

    /// Generate a fresh URI for `filename`, uploaded by `owner`, under `folder`.
    ///
    /// Layout: `{scheme}://{folder}/{owner}/{yyyy}/{mm}/{uuid8}_{sanitized filename}`.
    fn generate_uri(&self, folder: &str, owner: Uuid, filename: &str) -> String {
        let now = chrono::Utc::now();
        let unique_id = Uuid::now_v7().simple().to_string();
        format!(
            "{}://{}/{}/{}/{}/{}_{}",
            self.scheme(),
            folder.trim_matches('/'),
            owner,
            now.format("%Y"),
            now.format("%m"),
            &unique_id[24..],
            sanitize_filename(filename)
        )
    }

    /// The user who uploaded `uri`, if it is a URI this backend generated.
    fn uploader(&self, uri: &str) -> Option<Uuid> {
        let path = uri.strip_prefix(self.scheme())?.strip_prefix("://")?;
        let mut segments = path.split('/');
        segments.next()?;
        segments.next()?.parse().ok()
    }
}

/// Reduce a client-supplied filename to `[A-Za-z0-9._-]`.
///
/// Directory components are discarded, so traversal sequences collapse to
/// the final path segment.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for object storage.
    base_path: PathBuf,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalFileStorage {
    /// Create a new local file storage.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    /// Parse a local:// URI to get the filesystem path.
    ///
    /// Rejects paths containing `..` or absolute components.
    fn parse_uri(&self, uri: &str) -> Result<PathBuf> {
        let path = uri
            .strip_prefix("local://")
            .context("invalid local URI, must start with local://")?;
        for component in Path::new(path).components() {
            if !matches!(component, Component::Normal(_)) {
                anyhow::bail!("only plain relative paths are allowed in storage URIs");
            }
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let path = self.parse_uri(uri)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(uri = %uri, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.parse_uri(uri)?;
        let data = fs::read(&path).await.context("failed to read file")?;
        debug!(uri = %uri, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.parse_uri(uri)?;

        let present = fs::try_exists(&path)
            .await
            .context("failed to check file before deletion")?;
        if present {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(uri = %uri, "file deleted");
        } else {
            warn!(uri = %uri, "file not found for deletion");
        }

        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = self.parse_uri(uri)?;
        fs::try_exists(&path)
            .await
            .context("failed to check file existence")
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("local://").unwrap_or(uri);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// S3-compatible object storage.
#[cfg(feature = "s3")]
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    /// Optional prefix for all keys.
    prefix: Option<String>,
    /// Base URL for public access (e.g., CloudFront distribution).
    base_url: String,
}

#[cfg(feature = "s3")]
impl S3FileStorage {
    /// Create a new S3 storage, optionally against a custom endpoint (MinIO etc.).
    ///
    /// Uses the default AWS credential chain (env vars, config file, instance profile).
    pub async fn new(
        endpoint_url: Option<&str>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let mut loader = aws_config::from_env();
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let client = aws_sdk_s3::Client::new(&config);

        Ok(Self {
            client,
            bucket: bucket.into(),
            prefix,
            base_url: base_url.into(),
        })
    }

    /// Parse an s3:// URI to get the S3 key.
    fn parse_uri(&self, uri: &str) -> Result<String> {
        let path = uri
            .strip_prefix("s3://")
            .context("invalid S3 URI, must start with s3://")?;

        match &self.prefix {
            Some(prefix) => Ok(format!("{}/{}", prefix.trim_end_matches('/'), path)),
            None => Ok(path.to_string()),
        }
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl FileStorage for S3FileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let key = self.parse_uri(uri)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
            .send()
            .await
            .context("failed to upload to S3")?;

        debug!(uri = %uri, key = %key, size = data.len(), "object written to S3");
        Ok(())
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let key = self.parse_uri(uri)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .context("failed to get object from S3")?;

        let data = response
            .body
            .collect()
            .await
            .context("failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let key = self.parse_uri(uri)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .context("failed to delete from S3")?;

        debug!(uri = %uri, "object deleted from S3");
        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let key = self.parse_uri(uri)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_not_found() {
                        return Ok(false);
                    }
                }
                Err(err).context("failed to check S3 object existence")
            }
        }
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("s3://").unwrap_or(uri);
        match &self.prefix {
            Some(prefix) => format!(
                "{}/{}/{}",
                self.base_url.trim_end_matches('/'),
                prefix.trim_end_matches('/'),
                path
            ),
            None => format!("{}/{}", self.base_url.trim_end_matches('/'), path),
        }
    }

    fn scheme(&self) -> &'static str {
        "s3"
    }
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStorage")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .finish()
    }
}
