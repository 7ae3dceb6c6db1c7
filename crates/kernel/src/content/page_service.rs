//! Page service.
//!
//! Create, update, move and cascade-delete pages within a user's scope.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::cascade::{DeleteOutcome, page_assets, removal_batch};
use super::error::{ContentError, ContentResult, retry_on_conflict, validate_title};
use super::ordering::{Ordered, next_index, plan_move};
use super::slug::unique_slug;
use crate::file::FileService;
use crate::models::{CreatePage, Page, UpdatePage};
use crate::store::{Collection, DocumentStore, Scope, Visibility, WriteBatch, WriteOp};

/// Service for page operations.
#[derive(Clone)]
pub struct PageService {
    inner: Arc<PageServiceInner>,
}

struct PageServiceInner {
    store: Arc<dyn DocumentStore>,
    files: Arc<FileService>,
}

impl PageService {
    /// Create a new page service.
    pub fn new(store: Arc<dyn DocumentStore>, files: Arc<FileService>) -> Self {
        Self {
            inner: Arc::new(PageServiceInner { store, files }),
        }
    }

    /// List a user's pages as seen by `viewer`.
    ///
    /// The owner sees every page; anyone else only public ones.
    pub async fn list(&self, owner_id: Uuid, viewer: Option<Uuid>) -> ContentResult<Vec<Page>> {
        let visibility = if viewer == Some(owner_id) {
            Visibility::All
        } else {
            Visibility::PublicOnly
        };
        Ok(self.inner.store.list_pages(owner_id, visibility).await?)
    }

    /// Every page of a user, for reconciliation.
    pub async fn siblings(&self, owner_id: Uuid) -> ContentResult<Vec<Page>> {
        Ok(self.inner.store.list_pages(owner_id, Visibility::All).await?)
    }

    /// Load a page by ID.
    pub async fn load(&self, id: Uuid) -> ContentResult<Option<Page>> {
        Ok(self.inner.store.find_page(id).await?)
    }

    /// Load a page by slug within its owner's scope.
    pub async fn load_by_slug(&self, owner_id: Uuid, slug: &str) -> ContentResult<Option<Page>> {
        Ok(self.inner.store.find_page_by_slug(owner_id, slug).await?)
    }

    /// Create a page at the end of the owner's list.
    ///
    /// Index and slug come from a fresh read; a concurrent create claiming
    /// either is retried.
    pub async fn create(&self, owner_id: Uuid, input: CreatePage) -> ContentResult<Page> {
        let title = validate_title(&input.title)?;
        let mut attempt = 0;

        loop {
            let result = self.try_create(owner_id, &title, &input).await;
            if !retry_on_conflict(&result, &mut attempt, "create page") {
                return result;
            }
        }
    }

    async fn try_create(&self, owner_id: Uuid, title: &str, input: &CreatePage) -> ContentResult<Page> {
        let store = self.inner.store.as_ref();
        let siblings = store.list_pages(owner_id, Visibility::All).await?;
        let slug = unique_slug(store, Scope::UserPages(owner_id), title).await?;

        let page = Page {
            id: Uuid::now_v7(),
            owner_id,
            slug,
            order_index: next_index(&siblings),
            title: title.to_string(),
            description: input.description.clone(),
            thumbnail: input.thumbnail.clone().filter(|t| !t.is_empty()),
            is_private: input.is_private,
            info_text: String::new(),
            created: Utc::now(),
        };
        store.insert_page(&page).await?;

        info!(page_id = %page.id, slug = %page.slug, order_index = page.order_index, "page created");
        Ok(page)
    }

    /// Update a page's fields and, when `order_index` is given, move it.
    ///
    /// `siblings` is the caller's snapshot of the owner's pages. A stale
    /// snapshot surfaces as [`ContentError::Conflict`].
    pub async fn update(&self, id: Uuid, input: UpdatePage, siblings: &[Page]) -> ContentResult<Page> {
        if let Some(title) = &input.title {
            validate_title(title)?;
        }

        let current = self
            .inner
            .store
            .find_page(id)
            .await?
            .ok_or(ContentError::NotFound)?;
        let mut page = current.merged(&input);
        if let Some(title) = &input.title {
            page.title = title.trim().to_string();
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutPage(page.clone()));

        if let Some(requested) = input.order_index {
            let plan = plan_move(id, requested, siblings).ok_or_else(|| {
                ContentError::Conflict(format!("page {id} missing from sibling snapshot"))
            })?;
            batch.expect_count(current.scope(), siblings.len());
            plan.write_into(&mut batch, Collection::Pages);
            page.order_index = plan.to;
        }

        self.inner.store.commit(batch).await?;

        info!(page_id = %id, order_index = page.order_index, "page updated");
        Ok(page)
    }

    /// [`update`](Self::update) against a fresh snapshot, retrying on conflict.
    pub async fn update_in_scope(&self, id: Uuid, input: UpdatePage) -> ContentResult<Page> {
        let mut attempt = 0;

        loop {
            let page = self.load(id).await?.ok_or(ContentError::NotFound)?;
            let siblings = self.siblings(page.owner_id).await?;
            let result = self.update(id, input.clone(), &siblings).await;
            if !retry_on_conflict(&result, &mut attempt, "update page") {
                return result;
            }
        }
    }

    /// Delete a page, its posts and their assets, then close the gap.
    pub async fn delete(&self, id: Uuid, siblings: &[Page]) -> ContentResult<DeleteOutcome> {
        let store = self.inner.store.as_ref();

        let Some(page) = siblings.iter().find(|p| p.id == id) else {
            warn!(page_id = %id, "page missing from sibling snapshot, deleting record only");
            let mut batch = WriteBatch::new();
            batch.delete(Collection::Pages, id);
            store.commit(batch).await?;
            return Ok(DeleteOutcome::Degraded);
        };

        let posts = store.list_posts(id).await?;
        let cleanup = self
            .inner
            .files
            .delete_best_effort(page.owner_id, &page_assets(page, &posts))
            .await;

        let children: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        store
            .commit(removal_batch(page, siblings, Some(children.as_slice())))
            .await?;

        info!(
            page_id = %id,
            posts = children.len(),
            assets_removed = cleanup.removed,
            assets_failed = cleanup.failed,
            "page deleted"
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
            let page = self.load(id).await?.ok_or(ContentError::NotFound)?;
            let siblings = self.siblings(page.owner_id).await?;
            let result = self.delete(id, &siblings).await;
            if !retry_on_conflict(&result, &mut attempt, "delete page") {
                return result;
            }
        }
    }
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService").finish_non_exhaustive()
    }
}
