//! In-process document store.
//!
//! Backs development runs without PostgreSQL and the test suites. A batch is
//! applied to a staged copy of the tables under the write lock and swapped in
//! only if every operation and precondition and the per-scope order
//! uniqueness check succeed.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    Collection, DocumentStore, Scope, StoreError, StoreResult, Visibility, WriteBatch, WriteOp,
};
use crate::models::{Page, Post, User};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    pages: HashMap<Uuid, Page>,
    posts: HashMap<Uuid, Post>,
}

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages across all users.
    pub fn page_count(&self) -> usize {
        self.tables.read().pages.len()
    }

    /// Number of posts across all pages.
    pub fn post_count(&self) -> usize {
        self.tables.read().posts.len()
    }
}

impl Tables {
    fn scope_len(&self, scope: Scope) -> usize {
        match scope {
            Scope::UserPages(owner_id) => {
                self.pages.values().filter(|p| p.owner_id == owner_id).count()
            }
            Scope::PagePosts(page_id) => {
                self.posts.values().filter(|p| p.page_id == page_id).count()
            }
        }
    }

    fn order_index_of(&self, collection: Collection, id: Uuid) -> Option<i32> {
        match collection {
            Collection::Pages => self.pages.get(&id).map(|p| p.order_index),
            Collection::Posts => self.posts.get(&id).map(|p| p.order_index),
        }
    }

    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::SetOrderIndex {
                collection,
                id,
                expected,
                order_index,
            } => {
                let current = match collection {
                    Collection::Pages => self.pages.get_mut(&id).map(|p| &mut p.order_index),
                    Collection::Posts => self.posts.get_mut(&id).map(|p| &mut p.order_index),
                };
                let Some(current) = current else {
                    return Err(StoreError::Conflict(format!(
                        "{} record {id} no longer exists",
                        collection.as_str()
                    )));
                };
                if *current != expected {
                    return Err(StoreError::Conflict(format!(
                        "{} record {id} is at index {current}, expected {expected}",
                        collection.as_str()
                    )));
                }
                *current = order_index;
            }
            WriteOp::PutPage(page) => {
                let existing = self.pages.get_mut(&page.id).ok_or(StoreError::NotFound)?;
                existing.title = page.title;
                existing.description = page.description;
                existing.thumbnail = page.thumbnail;
                existing.is_private = page.is_private;
                existing.info_text = page.info_text;
            }
            WriteOp::PutPost(post) => {
                let existing = self.posts.get_mut(&post.id).ok_or(StoreError::NotFound)?;
                existing.title = post.title;
                existing.description = post.description;
                existing.content_type = post.content_type;
                existing.content = post.content;
                existing.thumbnail = post.thumbnail;
            }
            WriteOp::Delete { collection, id } => self.remove(collection, id),
            WriteOp::DeleteAt {
                collection,
                id,
                expected,
            } => {
                match self.order_index_of(collection, id) {
                    Some(current) if current == expected => {}
                    Some(current) => {
                        return Err(StoreError::Conflict(format!(
                            "{} record {id} is at index {current}, expected {expected}",
                            collection.as_str()
                        )));
                    }
                    None => {
                        return Err(StoreError::Conflict(format!(
                            "{} record {id} no longer exists",
                            collection.as_str()
                        )));
                    }
                }
                self.remove(collection, id);
            }
            WriteOp::ExpectCount { scope, count } => {
                let current = self.scope_len(scope);
                if current != count {
                    return Err(StoreError::Conflict(format!(
                        "{} scope {} holds {current} records, expected {count}",
                        scope.collection().as_str(),
                        scope.parent_id()
                    )));
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, collection: Collection, id: Uuid) {
        match collection {
            Collection::Pages => {
                self.pages.remove(&id);
            }
            Collection::Posts => {
                self.posts.remove(&id);
            }
        }
    }

    /// Reject an insert that does not land one past the scope's last index.
    fn check_append(&self, scope: Scope, order_index: i32) -> StoreResult<()> {
        let last = match scope {
            Scope::UserPages(owner_id) => self
                .pages
                .values()
                .filter(|p| p.owner_id == owner_id)
                .map(|p| p.order_index)
                .max(),
            Scope::PagePosts(page_id) => self
                .posts
                .values()
                .filter(|p| p.page_id == page_id)
                .map(|p| p.order_index)
                .max(),
        };
        let next = last.unwrap_or(0).saturating_add(1);
        if order_index != next {
            return Err(StoreError::Conflict(format!(
                "{} order_index {order_index} is not the next index {next}",
                scope.collection().as_str()
            )));
        }
        Ok(())
    }

    /// Reject duplicate `(parent, order_index)` pairs, like a deferred unique constraint.
    fn check_order_uniqueness(&self) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for page in self.pages.values() {
            if !seen.insert((page.owner_id, page.order_index)) {
                return Err(StoreError::Conflict(format!(
                    "duplicate page order_index {} for owner {}",
                    page.order_index, page.owner_id
                )));
            }
        }
        seen.clear();
        for post in self.posts.values() {
            if !seen.insert((post.page_id, post.order_index)) {
                return Err(StoreError::Conflict(format!(
                    "duplicate post order_index {} for page {}",
                    post.order_index, post.page_id
                )));
            }
        }
        Ok(())
    }
}

fn sorted_by_order<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict(
                "username or email already registered".to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_user_info_text(&self, id: Uuid, info_text: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(false);
        };
        user.info_text = info_text.to_string();
        Ok(true)
    }

    async fn list_pages(&self, owner_id: Uuid, visibility: Visibility) -> StoreResult<Vec<Page>> {
        let pages = self
            .tables
            .read()
            .pages
            .values()
            .filter(|p| p.owner_id == owner_id)
            .filter(|p| visibility == Visibility::All || !p.is_private)
            .cloned()
            .collect();
        Ok(sorted_by_order(pages, |p: &Page| (p.order_index, p.created)))
    }

    async fn find_page(&self, id: Uuid) -> StoreResult<Option<Page>> {
        Ok(self.tables.read().pages.get(&id).cloned())
    }

    async fn find_page_by_slug(&self, owner_id: Uuid, slug: &str) -> StoreResult<Option<Page>> {
        Ok(self
            .tables
            .read()
            .pages
            .values()
            .find(|p| p.owner_id == owner_id && p.slug == slug)
            .cloned())
    }

    async fn insert_page(&self, page: &Page) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.pages.values().find(|p| {
            p.owner_id == page.owner_id
                && (p.slug == page.slug || p.order_index == page.order_index)
        }) {
            return Err(StoreError::Conflict(format!(
                "page slug or order_index already used by {}",
                existing.id
            )));
        }
        tables.check_append(Scope::UserPages(page.owner_id), page.order_index)?;
        tables.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn list_posts(&self, page_id: Uuid) -> StoreResult<Vec<Post>> {
        let posts = self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| p.page_id == page_id)
            .cloned()
            .collect();
        Ok(sorted_by_order(posts, |p: &Post| (p.order_index, p.created)))
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn find_post_by_slug(&self, page_id: Uuid, slug: &str) -> StoreResult<Option<Post>> {
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .find(|p| p.page_id == page_id && p.slug == slug)
            .cloned())
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.posts.values().find(|p| {
            p.page_id == post.page_id
                && (p.slug == post.slug || p.order_index == post.order_index)
        }) {
            return Err(StoreError::Conflict(format!(
                "post slug or order_index already used by {}",
                existing.id
            )));
        }
        tables.check_append(Scope::PagePosts(post.page_id), post.order_index)?;
        tables.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn slug_exists(&self, scope: Scope, slug: &str) -> StoreResult<bool> {
        let tables = self.tables.read();
        let exists = match scope {
            Scope::UserPages(owner_id) => tables
                .pages
                .values()
                .any(|p| p.owner_id == owner_id && p.slug == slug),
            Scope::PagePosts(page_id) => tables
                .posts
                .values()
                .any(|p| p.page_id == page_id && p.slug == slug),
        };
        Ok(exists)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mut staged = tables.clone();
        for op in batch.into_ops() {
            staged.apply(op)?;
        }
        staged.check_order_uniqueness()?;
        *tables = staged;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
