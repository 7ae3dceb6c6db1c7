//! Order-index reconciliation.
//!
//! Siblings in a scope occupy the indices `1..=N` exactly once. These
//! planners compute the index changes needed to keep that true when one
//! sibling moves or is removed; callers turn the plan into a [`WriteBatch`]
//! and commit it atomically.

use uuid::Uuid;

use crate::models::{Page, Post};
use crate::store::{Collection, Scope, WriteBatch};

/// A record with a position among its siblings.
pub trait Ordered {
    fn id(&self) -> Uuid;
    fn order_index(&self) -> i32;
    /// The sibling set this record belongs to.
    fn scope(&self) -> Scope;
}

impl Ordered for Page {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn scope(&self) -> Scope {
        Scope::UserPages(self.owner_id)
    }
}

impl Ordered for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn scope(&self) -> Scope {
        Scope::PagePosts(self.page_id)
    }
}

/// One sibling's index change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChange {
    pub id: Uuid,
    pub from: i32,
    pub to: i32,
}

/// Index changes for moving one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub id: Uuid,
    pub from: i32,
    /// Requested index after clamping to `[1, N]`.
    pub to: i32,
    /// Siblings shifted to make room, excluding the moved item.
    pub shifted: Vec<IndexChange>,
}

impl MovePlan {
    /// Whether the item keeps its position.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Every index change including the moved item's own.
    pub fn changes(&self) -> impl Iterator<Item = IndexChange> + '_ {
        let own = (!self.is_noop()).then_some(IndexChange {
            id: self.id,
            from: self.from,
            to: self.to,
        });
        self.shifted.iter().copied().chain(own)
    }

    /// Append the plan's index writes to `batch`.
    pub fn write_into(&self, batch: &mut WriteBatch, collection: Collection) {
        push_changes(batch, collection, self.changes());
    }
}

/// Append index changes to a batch, each guarded by its previous index.
pub fn push_changes(
    batch: &mut WriteBatch,
    collection: Collection,
    changes: impl IntoIterator<Item = IndexChange>,
) {
    for change in changes {
        batch.set_order_index(collection, change.id, change.from, change.to);
    }
}

/// Clamp a requested index into `[1, len]`.
pub fn clamp_index(requested: i32, len: usize) -> i32 {
    let upper = i32::try_from(len).unwrap_or(i32::MAX).max(1);
    requested.clamp(1, upper)
}

/// Index for a newly created sibling: one past the current maximum.
pub fn next_index<T: Ordered>(siblings: &[T]) -> i32 {
    siblings
        .iter()
        .map(Ordered::order_index)
        .max()
        .unwrap_or(0)
        + 1
}

/// Plan moving `id` to `requested` within `siblings`.
///
/// Returns `None` if `id` is not in the snapshot. Moving earlier shifts the
/// siblings in `[to, from)` up by one; moving later shifts those in
/// `(from, to]` down by one.
pub fn plan_move<T: Ordered>(id: Uuid, requested: i32, siblings: &[T]) -> Option<MovePlan> {
    let from = siblings.iter().find(|s| s.id() == id)?.order_index();
    let to = clamp_index(requested, siblings.len());

    let shifted = siblings
        .iter()
        .filter(|s| s.id() != id)
        .filter_map(|s| {
            let index = s.order_index();
            let delta = if to < from && index >= to && index < from {
                1
            } else if to > from && index > from && index <= to {
                -1
            } else {
                return None;
            };
            Some(IndexChange {
                id: s.id(),
                from: index,
                to: index + delta,
            })
        })
        .collect();

    Some(MovePlan {
        id,
        from,
        to,
        shifted,
    })
}

/// Plan closing the gap left by removing the sibling at `removed_index`.
///
/// Every sibling with a larger index moves down by one. The removed item
/// itself, if still present in `siblings`, is skipped.
pub fn plan_removal<T: Ordered>(removed_id: Uuid, removed_index: i32, siblings: &[T]) -> Vec<IndexChange> {
    siblings
        .iter()
        .filter(|s| s.id() != removed_id && s.order_index() > removed_index)
        .map(|s| IndexChange {
            id: s.id(),
            from: s.order_index(),
            to: s.order_index() - 1,
        })
        .collect()
}

/// Whether `siblings` occupy exactly `1..=N`.
pub fn is_dense<T: Ordered>(siblings: &[T]) -> bool {
    let mut indices: Vec<i32> = siblings.iter().map(Ordered::order_index).collect();
    indices.sort_unstable();
    indices
        .iter()
        .zip(1..)
        .all(|(&index, expected)| index == expected)
}
