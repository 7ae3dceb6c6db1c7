//! Document store abstraction.
//!
//! All page, post and user persistence goes through [`DocumentStore`]. The
//! store answers scoped queries ordered by `order_index` and applies a
//! [`WriteBatch`] atomically: either every operation lands or none does.
//!
//! Order-index writes and guarded deletes carry the index the caller
//! observed, and a batch may pin the number of records in a scope. A batch
//! whose expectations no longer hold is rejected with
//! [`StoreError::Conflict`], which lets callers detect that their sibling
//! snapshot went stale.
//!
//! Inserts only append: a new record's `order_index` must be one past the
//! last index in its scope.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

use crate::models::{Page, Post, User};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A batch precondition or uniqueness constraint failed.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A batch targeted a record that does not exist.
    #[error("record not found")]
    NotFound,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Pages,
    Posts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Pages => "pages",
            Collection::Posts => "posts",
        }
    }
}

/// A set of siblings sharing one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Pages owned by a user.
    UserPages(Uuid),
    /// Posts belonging to a page.
    PagePosts(Uuid),
}

impl Scope {
    pub fn collection(&self) -> Collection {
        match self {
            Scope::UserPages(_) => Collection::Pages,
            Scope::PagePosts(_) => Collection::Posts,
        }
    }

    pub fn parent_id(&self) -> Uuid {
        match self {
            Scope::UserPages(id) | Scope::PagePosts(id) => *id,
        }
    }
}

/// Which pages of a user to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every page (owner view).
    All,
    /// Only pages with `is_private = false`.
    PublicOnly,
}

/// One operation of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Move a record to `order_index`, provided it is still at `expected`.
    SetOrderIndex {
        collection: Collection,
        id: Uuid,
        expected: i32,
        order_index: i32,
    },
    /// Overwrite a page's editable fields (not slug, owner or order).
    PutPage(Page),
    /// Overwrite a post's editable fields (not slug, page or order).
    PutPost(Post),
    /// Delete a record. Deleting a missing record is not an error.
    Delete { collection: Collection, id: Uuid },
    /// Delete a record that must still be at `expected`.
    DeleteAt {
        collection: Collection,
        id: Uuid,
        expected: i32,
    },
    /// Require `scope` to hold exactly `count` records at this point of the batch.
    ExpectCount { scope: Scope, count: usize },
}

/// Operations committed together, in order, as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn set_order_index(
        &mut self,
        collection: Collection,
        id: Uuid,
        expected: i32,
        order_index: i32,
    ) {
        self.push(WriteOp::SetOrderIndex {
            collection,
            id,
            expected,
            order_index,
        });
    }

    pub fn delete(&mut self, collection: Collection, id: Uuid) {
        self.push(WriteOp::Delete { collection, id });
    }

    pub fn delete_at(&mut self, collection: Collection, id: Uuid, expected: i32) {
        self.push(WriteOp::DeleteAt {
            collection,
            id,
            expected,
        });
    }

    pub fn expect_count(&mut self, scope: Scope, count: usize) {
        self.push(WriteOp::ExpectCount { scope, count });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Persistence backend for users, pages and posts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` if the username or email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Set a user's dashboard info text. Returns false if the user is missing.
    async fn set_user_info_text(&self, id: Uuid, info_text: &str) -> StoreResult<bool>;

    /// List a user's pages ordered by `order_index`.
    async fn list_pages(&self, owner_id: Uuid, visibility: Visibility) -> StoreResult<Vec<Page>>;

    async fn find_page(&self, id: Uuid) -> StoreResult<Option<Page>>;

    async fn find_page_by_slug(&self, owner_id: Uuid, slug: &str) -> StoreResult<Option<Page>>;

    /// Insert a page. Fails with `Conflict` if its slug is taken or its order
    /// index is not one past the owner's last page.
    async fn insert_page(&self, page: &Page) -> StoreResult<()>;

    /// List a page's posts ordered by `order_index`.
    async fn list_posts(&self, page_id: Uuid) -> StoreResult<Vec<Post>>;

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    async fn find_post_by_slug(&self, page_id: Uuid, slug: &str) -> StoreResult<Option<Post>>;

    /// Insert a post. Fails with `Conflict` if its slug is taken or its order
    /// index is not one past the page's last post.
    async fn insert_post(&self, post: &Post) -> StoreResult<()>;

    /// Whether `slug` is used in `scope`.
    async fn slug_exists(&self, scope: Scope, slug: &str) -> StoreResult<bool>;

    /// Apply every operation of `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Check that the backend is reachable.
    async fn is_healthy(&self) -> bool;
}
