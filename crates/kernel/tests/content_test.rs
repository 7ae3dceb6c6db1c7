#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Content service tests.
//!
//! Exercises the page and post services directly over the in-memory store:
//! ordering under random edit sequences, cascade deletion with a storage
//! backend that refuses some deletes, and stale sibling snapshots.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use proptest::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

use folio_kernel::content::{ContentError, DeleteOutcome, PageService, PostService};
use folio_kernel::file::{FileService, FileStorage, LocalFileStorage};
use folio_kernel::models::{ContentType, CreatePage, CreatePost, Page, UpdatePage};
use folio_kernel::store::MemoryDocumentStore;

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
const PDF_BYTES: &[u8] = b"%PDF-1.4\n% test document\n";

/// Local storage whose deletes fail for URIs containing a marker.
struct StubbornStorage {
    inner: LocalFileStorage,
    marker: &'static str,
}

#[async_trait]
impl FileStorage for StubbornStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        self.inner.write(uri, data).await
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        self.inner.read(uri).await
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        if uri.contains(self.marker) {
            bail!("permission denied: {uri}");
        }
        self.inner.delete(uri).await
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        self.inner.exists(uri).await
    }

    fn public_url(&self, uri: &str) -> String {
        self.inner.public_url(uri)
    }

    fn scheme(&self) -> &'static str {
        self.inner.scheme()
    }
}

struct Services {
    pages: PageService,
    posts: PostService,
    files: Arc<FileService>,
    store: Arc<MemoryDocumentStore>,
    _dir: TempDir,
}

fn services_with(storage: impl FnOnce(&TempDir) -> Arc<dyn FileStorage>) -> Services {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(FileService::new(storage(&dir)));
    let store = Arc::new(MemoryDocumentStore::new());
    Services {
        pages: PageService::new(store.clone(), files.clone()),
        posts: PostService::new(store.clone(), files.clone()),
        files,
        store,
        _dir: dir,
    }
}

fn services() -> Services {
    services_with(|dir| Arc::new(LocalFileStorage::new(dir.path(), "/files")))
}

fn titled(title: &str) -> CreatePage {
    CreatePage {
        title: title.to_string(),
        ..Default::default()
    }
}

fn moved_to(order_index: i32) -> UpdatePage {
    UpdatePage {
        order_index: Some(order_index),
        ..Default::default()
    }
}

fn slugs(pages: &[Page]) -> Vec<&str> {
    pages.iter().map(|p| p.slug.as_str()).collect()
}

fn indices(pages: &[Page]) -> Vec<i32> {
    pages.iter().map(|p| p.order_index).collect()
}

fn dense(len: usize) -> Vec<i32> {
    (1..).take(len).collect()
}

// =============================================================================
// Ordering under random edits
// =============================================================================

#[derive(Debug, Clone)]
enum Edit {
    Create,
    Move { pick: usize, to: i32 },
    Delete { pick: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        2 => Just(Edit::Create),
        2 => (any::<usize>(), -2i32..10).prop_map(|(pick, to)| Edit::Move { pick, to }),
        1 => any::<usize>().prop_map(|pick| Edit::Delete { pick }),
    ]
}

async fn apply_edits(edits: Vec<Edit>) {
    let s = services();
    let owner = Uuid::now_v7();
    let mut created = 0;

    for edit in edits {
        let before = s.pages.siblings(owner).await.unwrap();
        match edit {
            Edit::Create => {
                created += 1;
                let page = s.pages.create(owner, titled(&format!("page {created}"))).await.unwrap();
                assert_eq!(page.order_index as usize, before.len() + 1);
            }
            Edit::Move { pick, to } if !before.is_empty() => {
                let target = &before[pick % before.len()];
                let moved = s.pages.update(target.id, moved_to(to), &before).await.unwrap();
                let expected = to.clamp(1, before.len() as i32);
                assert_eq!(moved.order_index, expected);

                // Relative order of the others is preserved
                let after = s.pages.siblings(owner).await.unwrap();
                let others_before: Vec<Uuid> =
                    before.iter().map(|p| p.id).filter(|id| *id != target.id).collect();
                let others_after: Vec<Uuid> =
                    after.iter().map(|p| p.id).filter(|id| *id != target.id).collect();
                assert_eq!(others_before, others_after);
            }
            Edit::Delete { pick } if !before.is_empty() => {
                let target = &before[pick % before.len()];
                let outcome = s.pages.delete(target.id, &before).await.unwrap();
                assert!(matches!(outcome, DeleteOutcome::Deleted { .. }));
            }
            _ => {}
        }

        let after = s.pages.siblings(owner).await.unwrap();
        assert_eq!(indices(&after), dense(after.len()));
        assert_eq!(s.store.page_count(), after.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_edits_keep_pages_dense(edits in prop::collection::vec(edit_strategy(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(apply_edits(edits));
    }
}

// =============================================================================
// Stale snapshots
// =============================================================================

#[tokio::test]
async fn stale_snapshot_conflicts_and_in_scope_retries() {
    let s = services();
    let owner = Uuid::now_v7();
    for title in ["a", "b", "c"] {
        s.pages.create(owner, titled(title)).await.unwrap();
    }
    let stale = s.pages.siblings(owner).await.unwrap();
    let (b, c) = (stale[1].id, stale[2].id);

    // Another writer moves c to the front
    s.pages.update_in_scope(c, moved_to(1)).await.unwrap();
    assert_eq!(slugs(&s.pages.siblings(owner).await.unwrap()), ["c", "a", "b"]);

    let err = s.pages.update(b, moved_to(1), &stale).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "got {err:?}");

    // The rejected batch left nothing half-applied
    let current = s.pages.siblings(owner).await.unwrap();
    assert_eq!(slugs(&current), ["c", "a", "b"]);
    assert_eq!(indices(&current), [1, 2, 3]);

    let moved = s.pages.update_in_scope(b, moved_to(1)).await.unwrap();
    assert_eq!(moved.order_index, 1);
    assert_eq!(slugs(&s.pages.siblings(owner).await.unwrap()), ["b", "c", "a"]);
}

#[tokio::test]
async fn stale_snapshot_delete_conflicts() {
    let s = services();
    let owner = Uuid::now_v7();
    for title in ["a", "b", "c"] {
        s.pages.create(owner, titled(title)).await.unwrap();
    }
    let stale = s.pages.siblings(owner).await.unwrap();
    s.pages.update_in_scope(stale[2].id, moved_to(1)).await.unwrap();

    let err = s.pages.delete(stale[0].id, &stale).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "got {err:?}");
    assert_eq!(s.store.page_count(), 3);

    s.pages.delete_in_scope(stale[0].id).await.unwrap();
    let current = s.pages.siblings(owner).await.unwrap();
    assert_eq!(slugs(&current), ["c", "b"]);
    assert_eq!(indices(&current), [1, 2]);
}

#[tokio::test]
async fn delete_conflicts_when_sibling_created_after_snapshot() {
    let s = services();
    let owner = Uuid::now_v7();
    for title in ["a", "b"] {
        s.pages.create(owner, titled(title)).await.unwrap();
    }
    let stale = s.pages.siblings(owner).await.unwrap();
    s.pages.create(owner, titled("c")).await.unwrap();

    let err = s.pages.delete(stale[0].id, &stale).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "got {err:?}");
    let current = s.pages.siblings(owner).await.unwrap();
    assert_eq!(slugs(&current), ["a", "b", "c"]);
    assert_eq!(indices(&current), [1, 2, 3]);

    s.pages.delete_in_scope(stale[0].id).await.unwrap();
    let current = s.pages.siblings(owner).await.unwrap();
    assert_eq!(slugs(&current), ["b", "c"]);
    assert_eq!(indices(&current), [1, 2]);
}

#[tokio::test]
async fn delete_conflicts_when_target_moved_after_snapshot() {
    let s = services();
    let owner = Uuid::now_v7();
    for title in ["a", "b"] {
        s.pages.create(owner, titled(title)).await.unwrap();
    }
    let stale = s.pages.siblings(owner).await.unwrap();
    let b = stale[1].id;
    s.pages.update_in_scope(b, moved_to(1)).await.unwrap();

    let err = s.pages.delete(b, &stale).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "got {err:?}");
    assert_eq!(indices(&s.pages.siblings(owner).await.unwrap()), [1, 2]);

    s.pages.delete_in_scope(b).await.unwrap();
    let current = s.pages.siblings(owner).await.unwrap();
    assert_eq!(slugs(&current), ["a"]);
    assert_eq!(indices(&current), [1]);
}

#[tokio::test]
async fn stale_post_delete_conflicts() {
    let s = services();
    let page = s.pages.create(Uuid::now_v7(), titled("Journal")).await.unwrap();
    let text = |title: &str| CreatePost {
        title: title.to_string(),
        description: String::new(),
        content_type: ContentType::Text,
        content: String::new(),
        thumbnail: None,
    };
    s.posts.create(page.id, text("one")).await.unwrap();
    let stale = s.posts.list(page.id).await.unwrap();
    s.posts.create(page.id, text("two")).await.unwrap();

    let err = s.posts.delete(stale[0].id, &stale).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "got {err:?}");
    assert_eq!(s.store.post_count(), 2);

    s.posts.delete_in_scope(stale[0].id).await.unwrap();
    let remaining = s.posts.list(page.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].slug, "two");
    assert_eq!(remaining[0].order_index, 1);
}

#[tokio::test]
async fn delete_missing_from_snapshot_is_degraded() {
    let s = services();
    let owner = Uuid::now_v7();
    s.pages.create(owner, titled("a")).await.unwrap();
    let last = s.pages.create(owner, titled("b")).await.unwrap();

    let outcome = s.pages.delete(last.id, &[]).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Degraded);
    assert!(s.pages.load(last.id).await.unwrap().is_none());
    assert_eq!(slugs(&s.pages.siblings(owner).await.unwrap()), ["a"]);
}

#[tokio::test]
async fn in_scope_operations_report_unknown_ids() {
    let s = services();
    let unknown = Uuid::now_v7();

    let err = s.pages.update_in_scope(unknown, moved_to(1)).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound));
    let err = s.pages.delete_in_scope(unknown).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound));
    let err = s.posts.delete_in_scope(unknown).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound));
}

// =============================================================================
// Cascade deletion
// =============================================================================

#[tokio::test]
async fn cascade_swallows_asset_failures() {
    let s = services_with(|dir| {
        Arc::new(StubbornStorage {
            inner: LocalFileStorage::new(dir.path(), "/files"),
            marker: "post-files",
        })
    });
    let owner = Uuid::now_v7();

    let thumb = s
        .files
        .upload(owner, "page-thumbnails", "cover.png", Some("image/png"), PNG_BYTES)
        .await
        .unwrap();
    let doc = s
        .files
        .upload(owner, "post-files", "notes.pdf", Some("application/pdf"), PDF_BYTES)
        .await
        .unwrap();

    let page = s
        .pages
        .create(
            owner,
            CreatePage {
                title: "Doomed".to_string(),
                thumbnail: Some(thumb.uri.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let keep = s.pages.create(owner, titled("Survivor")).await.unwrap();

    for (title, content_type, content) in [
        ("Doc", ContentType::File, doc.uri.clone()),
        ("Link", ContentType::Url, "https://example.com/x".to_string()),
    ] {
        s.posts
            .create(
                page.id,
                CreatePost {
                    title: title.to_string(),
                    description: String::new(),
                    content_type,
                    content,
                    thumbnail: None,
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(s.store.post_count(), 2);

    let outcome = s.pages.delete_in_scope(page.id).await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            assets_removed: 1,
            assets_failed: 1,
        }
    );

    // Records are gone even though one asset could not be removed
    assert_eq!(s.store.post_count(), 0);
    assert!(s.pages.load(page.id).await.unwrap().is_none());
    let storage = s.files.storage();
    assert!(!storage.exists(&thumb.uri).await.unwrap());
    assert!(storage.exists(&doc.uri).await.unwrap());

    let survivor = s.pages.load(keep.id).await.unwrap().unwrap();
    assert_eq!(survivor.order_index, 1);
}

#[tokio::test]
async fn post_delete_removes_its_assets_only() {
    let s = services();
    let owner = Uuid::now_v7();
    let page = s
        .pages
        .create(
            owner,
            CreatePage {
                title: "Album".to_string(),
                thumbnail: Some("https://cdn.example.com/cover.png".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let thumb = s
        .files
        .upload(owner, "post-thumbnails", "t.png", Some("image/png"), PNG_BYTES)
        .await
        .unwrap();
    let post = s
        .posts
        .create(
            page.id,
            CreatePost {
                title: "Shot".to_string(),
                description: String::new(),
                content_type: ContentType::Text,
                content: "caption".to_string(),
                thumbnail: Some(thumb.uri.clone()),
            },
        )
        .await
        .unwrap();

    let outcome = s.posts.delete_in_scope(post.id).await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            assets_removed: 1,
            assets_failed: 0,
        }
    );
    assert!(!s.files.storage().exists(&thumb.uri).await.unwrap());

    // The page and its external thumbnail are untouched
    let page = s.pages.load(page.id).await.unwrap().unwrap();
    assert_eq!(
        page.thumbnail.as_deref(),
        Some("https://cdn.example.com/cover.png")
    );
}

#[tokio::test]
async fn cleanup_leaves_other_users_files_alone() {
    let s = services();
    let (alice, mallory) = (Uuid::now_v7(), Uuid::now_v7());

    let thumb = s
        .files
        .upload(alice, "page-thumbnails", "cover.png", Some("image/png"), PNG_BYTES)
        .await
        .unwrap();
    let with_thumb = |title: &str| CreatePage {
        title: title.to_string(),
        thumbnail: Some(thumb.uri.clone()),
        ..Default::default()
    };
    let original = s.pages.create(alice, with_thumb("Mine")).await.unwrap();
    let copy = s.pages.create(mallory, with_thumb("Copied")).await.unwrap();

    let outcome = s.pages.delete_in_scope(copy.id).await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            assets_removed: 0,
            assets_failed: 0,
        }
    );
    assert!(s.files.storage().exists(&thumb.uri).await.unwrap());

    let outcome = s.pages.delete_in_scope(original.id).await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            assets_removed: 1,
            assets_failed: 0,
        }
    );
    assert!(!s.files.storage().exists(&thumb.uri).await.unwrap());
}

#[tokio::test]
async fn posts_are_scoped_to_their_page() {
    let s = services();
    let owner = Uuid::now_v7();
    let first = s.pages.create(owner, titled("First")).await.unwrap();
    let second = s.pages.create(owner, titled("Second")).await.unwrap();

    let text = |title: &str| CreatePost {
        title: title.to_string(),
        description: String::new(),
        content_type: ContentType::Text,
        content: String::new(),
        thumbnail: None,
    };

    let a = s.posts.create(first.id, text("Hello")).await.unwrap();
    let b = s.posts.create(second.id, text("Hello")).await.unwrap();
    assert_eq!(a.slug, "hello");
    assert_eq!(b.slug, "hello");
    assert_eq!((a.order_index, b.order_index), (1, 1));

    let err = s.posts.create(Uuid::now_v7(), text("Orphan")).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound));
}
