//! Slug generation.
//!
//! Slugs are derived from titles and must be unique within a scope (a user's
//! pages, or a page's posts). Collisions are resolved by linear probing with
//! numeric suffixes starting at `-2`.

use uuid::Uuid;

use crate::store::{DocumentStore, Scope, StoreResult};

/// Base used when a title has no slug-safe characters.
pub const EMPTY_SLUG_FALLBACK: &str = "untitled";

/// Highest numeric suffix tried before falling back to a UUID fragment.
const MAX_SLUG_SUFFIX: u32 = 101;

/// Convert a title into a URL-safe slug.
///
/// Lowercases and trims the title, turns each whitespace run into a single
/// hyphen, drops everything outside `[a-z0-9_-]`, then collapses repeated
/// hyphens. Leading or trailing hyphens that survive are kept.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
        }
    }

    // Collapse hyphen runs left by whitespace and stripped characters
    let mut result = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && result.ends_with('-') {
            continue;
        }
        result.push(c);
    }
    result
}

/// Base slug for a title, substituting [`EMPTY_SLUG_FALLBACK`] when empty.
pub fn base_slug(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        EMPTY_SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}

/// Find a slug for `title` not yet used in `scope`.
///
/// Tries the base slug, then `base-2`, `base-3`, ... with one existence query
/// per candidate. After [`MAX_SLUG_SUFFIX`] the suffix becomes a UUID fragment.
pub async fn unique_slug(store: &dyn DocumentStore, scope: Scope, title: &str) -> StoreResult<String> {
    let base = base_slug(title);

    if !store.slug_exists(scope, &base).await? {
        return Ok(base);
    }

    for counter in 2..=MAX_SLUG_SUFFIX {
        let candidate = format!("{base}-{counter}");
        if !store.slug_exists(scope, &candidate).await? {
            return Ok(candidate);
        }
    }

    let fragment = &Uuid::now_v7().simple().to_string()[24..];
    tracing::warn!(base = %base, "slug suffixes exhausted, using uuid fragment");
    Ok(format!("{base}-{fragment}"))
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::Page;
    use crate::store::MemoryDocumentStore;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("My Cool Page!"), "my-cool-page");
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_whitespace_runs() {
        assert_eq!(slugify("  hello \t  world  "), "hello-world");
        assert_eq!(slugify("a\nb"), "a-b");
    }

    #[test]
    fn test_slugify_strips_and_collapses() {
        assert_eq!(slugify("What's New?"), "whats-new");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slugify_keeps_edge_hyphens() {
        assert_eq!(slugify("- intro"), "-intro");
        assert_eq!(slugify("end -"), "end-");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(base_slug("!!!"), EMPTY_SLUG_FALLBACK);
        assert_eq!(base_slug("Ok"), "ok");
    }

    fn page(owner_id: Uuid, slug: &str, order_index: i32) -> Page {
        Page {
            id: Uuid::now_v7(),
            owner_id,
            slug: slug.to_string(),
            order_index,
            title: slug.to_string(),
            description: String::new(),
            thumbnail: None,
            is_private: false,
            info_text: String::new(),
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unique_slug_probes_suffixes() {
        let store = MemoryDocumentStore::new();
        let owner = Uuid::now_v7();
        let scope = Scope::UserPages(owner);

        assert_eq!(
            unique_slug(&store, scope, "My Cool Page!").await.unwrap(),
            "my-cool-page"
        );

        store.insert_page(&page(owner, "my-cool-page", 1)).await.unwrap();
        assert_eq!(
            unique_slug(&store, scope, "My Cool Page!").await.unwrap(),
            "my-cool-page-2"
        );

        store.insert_page(&page(owner, "my-cool-page-2", 2)).await.unwrap();
        assert_eq!(
            unique_slug(&store, scope, "My Cool Page!").await.unwrap(),
            "my-cool-page-3"
        );

        // Another owner's scope is independent
        assert_eq!(
            unique_slug(&store, Scope::UserPages(Uuid::now_v7()), "My Cool Page!")
                .await
                .unwrap(),
            "my-cool-page"
        );
    }
}
