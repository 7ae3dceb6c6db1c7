//! Cascade deletion.
//!
//! Deleting an item removes its binary assets first (best effort), then
//! commits one batch that deletes child records, closes the gap among the
//! remaining siblings and deletes the item itself. The batch pins the size
//! of every scope it read and the item's own index, so it only lands if the
//! snapshot it was planned from is still current.

use serde::Serialize;
use uuid::Uuid;

use super::ordering::{Ordered, plan_removal, push_changes};
use crate::models::{Page, Post};
use crate::store::{Collection, Scope, WriteBatch};

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Item, children and sibling reindexing committed together.
    Deleted {
        assets_removed: usize,
        assets_failed: usize,
    },
    /// The item was missing from the sibling snapshot; only its own record
    /// was deleted and siblings were left as they were.
    Degraded,
}

/// Every asset reference held by a page and its posts.
pub fn page_assets(page: &Page, posts: &[Post]) -> Vec<String> {
    page.thumbnail
        .iter()
        .map(String::as_str)
        .filter(|uri| !uri.is_empty())
        .chain(posts.iter().flat_map(Post::asset_uris))
        .map(str::to_string)
        .collect()
}

/// Batch deleting `removed` and its children, closing the gap in `siblings`.
///
/// `children` is `None` for records without posts. Operation order: scope
/// size checks, child deletes, sibling shifts, the item's own guarded delete.
pub fn removal_batch<T: Ordered>(removed: &T, siblings: &[T], children: Option<&[Uuid]>) -> WriteBatch {
    let scope = removed.scope();
    let collection = scope.collection();

    let mut batch = WriteBatch::new();
    batch.expect_count(scope, siblings.len());
    if let Some(children) = children {
        batch.expect_count(Scope::PagePosts(removed.id()), children.len());
        for child in children {
            batch.delete(Collection::Posts, *child);
        }
    }
    push_changes(
        &mut batch,
        collection,
        plan_removal(removed.id(), removed.order_index(), siblings),
    );
    batch.delete_at(collection, removed.id(), removed.order_index());
    batch
}
