//! Post service.
//!
//! Same ordering and cascade rules as pages, scoped to one page.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::cascade::{DeleteOutcome, removal_batch};
use super::error::{ContentError, ContentResult, retry_on_conflict, validate_title};
use super::ordering::{Ordered, next_index, plan_move};
use super::slug::unique_slug;
use crate::file::{AssetCleanup, FileService};
use crate::models::{CreatePost, Post, UpdatePost};
use crate::store::{Collection, DocumentStore, Scope, WriteBatch, WriteOp};

/// Service for post operations.
#[derive(Clone)]
pub struct PostService {
    inner: Arc<PostServiceInner>,
}

struct PostServiceInner {
    store: Arc<dyn DocumentStore>,
    files: Arc<FileService>,
}

impl PostService {
    /// Create a new post service.
    pub fn new(store: Arc<dyn DocumentStore>, files: Arc<FileService>) -> Self {
        Self {
            inner: Arc::new(PostServiceInner { store, files }),
        }
    }

    /// A page's posts ordered by index.
    pub async fn list(&self, page_id: Uuid) -> ContentResult<Vec<Post>> {
        Ok(self.inner.store.list_posts(page_id).await?)
    }

    pub async fn load(&self, id: Uuid) -> ContentResult<Option<Post>> {
        Ok(self.inner.store.find_post(id).await?)
    }

    pub async fn load_by_slug(&self, page_id: Uuid, slug: &str) -> ContentResult<Option<Post>> {
        Ok(self.inner.store.find_post_by_slug(page_id, slug).await?)
    }

    /// Append a post to a page.
    pub async fn create(&self, page_id: Uuid, input: CreatePost) -> ContentResult<Post> {
        let title = validate_title(&input.title)?;
        if self.inner.store.find_page(page_id).await?.is_none() {
            return Err(ContentError::NotFound);
        }

        let mut attempt = 0;
        loop {
            let result = self.try_create(page_id, &title, &input).await;
            if !retry_on_conflict(&result, &mut attempt, "create post") {
                return result;
            }
        }
    }

    async fn try_create(&self, page_id: Uuid, title: &str, input: &CreatePost) -> ContentResult<Post> {
        let store = self.inner.store.as_ref();
        let siblings = store.list_posts(page_id).await?;
        let slug = unique_slug(store, Scope::PagePosts(page_id), title).await?;

        let post = Post {
            id: Uuid::now_v7(),
            page_id,
            slug,
            order_index: next_index(&siblings),
            title: title.to_string(),
            description: input.description.clone(),
            content_type: input.content_type,
            content: input.content.clone(),
            thumbnail: input.thumbnail.clone().filter(|t| !t.is_empty()),
            created: Utc::now(),
        };
        store.insert_post(&post).await?;

        info!(post_id = %post.id, page_id = %page_id, order_index = post.order_index, "post created");
        Ok(post)
    }

    /// Update a post's fields and, when `order_index` is given, move it
    /// within its page.
    pub async fn update(&self, id: Uuid, input: UpdatePost, siblings: &[Post]) -> ContentResult<Post> {
        if let Some(title) = &input.title {
            validate_title(title)?;
        }

        let current = self
            .inner
            .store
            .find_post(id)
            .await?
            .ok_or(ContentError::NotFound)?;
        let mut post = current.merged(&input);
        if let Some(title) = &input.title {
            post.title = title.trim().to_string();
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutPost(post.clone()));

        if let Some(requested) = input.order_index {
            let plan = plan_move(id, requested, siblings).ok_or_else(|| {
                ContentError::Conflict(format!("post {id} missing from sibling snapshot"))
            })?;
            batch.expect_count(current.scope(), siblings.len());
            plan.write_into(&mut batch, Collection::Posts);
            post.order_index = plan.to;
        }

        self.inner.store.commit(batch).await?;

        info!(post_id = %id, order_index = post.order_index, "post updated");
        Ok(post)
    }

    /// [`update`](Self::update) against a fresh snapshot, retrying on conflict.
    pub async fn update_in_scope(&self, id: Uuid, input: UpdatePost) -> ContentResult<Post> {
        let mut attempt = 0;

        loop {
            let post = self.load(id).await?.ok_or(ContentError::NotFound)?;
            let siblings = self.list(post.page_id).await?;
            let result = self.update(id, input.clone(), &siblings).await;
            if !retry_on_conflict(&result, &mut attempt, "update post") {
                return result;
            }
        }
    }

    /// Delete a post and its assets, then close the gap.
    pub async fn delete(&self, id: Uuid, siblings: &[Post]) -> ContentResult<DeleteOutcome> {
        let store = self.inner.store.as_ref();

        let Some(post) = siblings.iter().find(|p| p.id == id) else {
            warn!(post_id = %id, "post missing from sibling snapshot, deleting record only");
            let mut batch = WriteBatch::new();
            batch.delete(Collection::Posts, id);
            store.commit(batch).await?;
            return Ok(DeleteOutcome::Degraded);
        };

        // Assets belong to whoever owns the page; an orphaned post keeps its files.
        let cleanup = match store.find_page(post.page_id).await? {
            Some(page) => {
                self.inner
                    .files
                    .delete_best_effort(page.owner_id, &post.asset_uris())
                    .await
            }
            None => AssetCleanup::default(),
        };

        store
            .commit(removal_batch(post, siblings, None))
            .await?;

        info!(
            post_id = %id,
            assets_removed = cleanup.removed,
            assets_failed = cleanup.failed,
            "post deleted"
        );
        Ok(DeleteOutcome::Deleted {
            assets_removed: cleanup.removed,
            assets_failed: cleanup.failed,
        })
    }

    /// [`delete`](Self::delete) against a fresh snapshot, retrying on conflict.
    pub async fn delete_in_scope(&self, id: Uuid) -> ContentResult<DeleteOutcome> {
        let mut attempt = 0;

        loop {
            let post = self.load(id).await?.ok_or(ContentError::NotFound)?;
            let siblings = self.list(post.page_id).await?;
            let result = self.delete(id, &siblings).await;
            if !retry_on_conflict(&result, &mut attempt, "delete post") {
                return result;
            }
        }
    }
}

impl std::fmt::Debug for PostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostService").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::PageService;
    use crate::file::LocalFileStorage;
    use crate::models::{ContentType, CreatePage};
    use crate::store::MemoryDocumentStore;

    struct Fixture {
        pages: PageService,
        posts: PostService,
        files: Arc<FileService>,
        owner: Uuid,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let files = Arc::new(FileService::new(Arc::new(LocalFileStorage::new(
            dir.path(),
            "/files",
        ))));
        Fixture {
            pages: PageService::new(store.clone(), files.clone()),
            posts: PostService::new(store, files.clone()),
            files,
            owner: Uuid::now_v7(),
            _dir: dir,
        }
    }

    fn text_post(title: &str) -> CreatePost {
        CreatePost {
            title: title.to_string(),
            description: String::new(),
            content_type: ContentType::Text,
            content: "body".to_string(),
            thumbnail: None,
        }
    }

    async fn page(fx: &Fixture) -> Uuid {
        let input = CreatePage {
            title: "Home".to_string(),
            ..Default::default()
        };
        fx.pages.create(fx.owner, input).await.unwrap().id
    }

    #[tokio::test]
    async fn test_create_requires_existing_page() {
        let fx = fixture();
        let err = fx.posts.create(Uuid::now_v7(), text_post("x")).await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound));
    }

    #[tokio::test]
    async fn test_slugs_are_scoped_per_page() {
        let fx = fixture();
        let (a, b) = (page(&fx).await, page(&fx).await);

        let first = fx.posts.create(a, text_post("Notes")).await.unwrap();
        let second = fx.posts.create(a, text_post("Notes")).await.unwrap();
        let other = fx.posts.create(b, text_post("Notes")).await.unwrap();

        assert_eq!(first.slug, "notes");
        assert_eq!(second.slug, "notes-2");
        assert_eq!(other.slug, "notes");
        assert_eq!(other.order_index, 1);
    }

    #[tokio::test]
    async fn test_move_and_delete_keep_indices_dense() {
        let fx = fixture();
        let page_id = page(&fx).await;
        for title in ["one", "two", "three", "four"] {
            fx.posts.create(page_id, text_post(title)).await.unwrap();
        }

        let snapshot = fx.posts.list(page_id).await.unwrap();
        let input = UpdatePost {
            order_index: Some(2),
            ..Default::default()
        };
        fx.posts.update(snapshot[3].id, input, &snapshot).await.unwrap();

        let snapshot = fx.posts.list(page_id).await.unwrap();
        let slugs: Vec<&str> = snapshot.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["one", "four", "two", "three"]);

        fx.posts.delete(snapshot[1].id, &snapshot).await.unwrap();
        let remaining = fx.posts.list(page_id).await.unwrap();
        let indices: Vec<i32> = remaining.iter().map(|p| p.order_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(remaining[1].slug, "two");
    }

    #[tokio::test]
    async fn test_delete_removes_file_assets() {
        let fx = fixture();
        let page_id = page(&fx).await;
        let pdf = b"%PDF-1.4 test";
        let upload = fx
            .files
            .upload(fx.owner, "post-files", "doc.pdf", Some("application/pdf"), pdf)
            .await
            .unwrap();

        let post = fx
            .posts
            .create(
                page_id,
                CreatePost {
                    title: "Doc".to_string(),
                    description: String::new(),
                    content_type: ContentType::File,
                    content: upload.uri.clone(),
                    thumbnail: None,
                },
            )
            .await
            .unwrap();

        let outcome = fx.posts.delete_in_scope(post.id).await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                assets_removed: 1,
                assets_failed: 0
            }
        );
        assert!(!fx.files.storage().exists(&upload.uri).await.unwrap());
        assert!(fx.posts.load(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_changes_content_type() {
        let fx = fixture();
        let page_id = page(&fx).await;
        let post = fx.posts.create(page_id, text_post("Link")).await.unwrap();

        let input = UpdatePost {
            content_type: Some(ContentType::Url),
            content: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let updated = fx.posts.update_in_scope(post.id, input).await.unwrap();
        assert_eq!(updated.content_type, ContentType::Url);
        assert_eq!(updated.order_index, 1);
        assert_eq!(fx.posts.load(post.id).await.unwrap().unwrap(), updated);
    }
}
