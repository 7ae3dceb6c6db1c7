//! Page model.
//!
//! A page belongs to exactly one user and holds an ordered list of posts.
//! `order_index` is dense (`1..=N`) across the owner's pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning user.
    pub owner_id: Uuid,

    /// URL slug, unique among the owner's pages.
    pub slug: String,

    /// Position among the owner's pages, starting at 1.
    pub order_index: i32,

    pub title: String,

    pub description: String,

    /// Storage URI of the thumbnail image.
    pub thumbnail: Option<String>,

    /// Hidden from everyone but the owner.
    pub is_private: bool,

    /// Free-form text shown at the top of the page.
    pub info_text: String,

    pub created: DateTime<Utc>,
}

/// Input for creating a page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePage {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Input for updating a page.
///
/// `thumbnail` uses a double option: `Some(None)` clears the thumbnail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePage {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    pub is_private: Option<bool>,
    pub info_text: Option<String>,
    pub order_index: Option<i32>,
}

impl Page {
    /// Apply the non-ordering fields of an update, returning the merged record.
    pub fn merged(&self, input: &UpdatePage) -> Self {
        let mut page = self.clone();
        if let Some(title) = &input.title {
            page.title = title.clone();
        }
        if let Some(description) = &input.description {
            page.description = description.clone();
        }
        if let Some(thumbnail) = &input.thumbnail {
            page.thumbnail = thumbnail.clone();
        }
        if let Some(is_private) = input.is_private {
            page.is_private = is_private;
        }
        if let Some(info_text) = &input.info_text {
            page.info_text = info_text.clone();
        }
        page
    }

    /// Whether `viewer` may see this page.
    pub fn visible_to(&self, viewer: Option<Uuid>) -> bool {
        !self.is_private || viewer == Some(self.owner_id)
    }
}

/// Serde helper distinguishing an absent field from an explicit `null`.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
