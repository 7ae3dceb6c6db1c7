//! Post model.
//!
//! Posts belong to a page and are ordered within it.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::page::double_option;

/// Kind of content a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Inline text.
    Text,
    /// External link.
    Url,
    /// Uploaded file; `content` holds its storage URI.
    File,
}

/// Post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,

    /// Owning page.
    pub page_id: Uuid,

    /// URL slug, unique within the page.
    pub slug: String,

    /// Position within the page, starting at 1.
    pub order_index: i32,

    pub title: String,

    pub description: String,

    pub content_type: ContentType,

    pub content: String,

    /// Storage URI of the thumbnail image.
    pub thumbnail: Option<String>,

    pub created: DateTime<Utc>,
}

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Input for updating a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<ContentType>,
    pub content: Option<String>,
    #[serde(default, with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    pub order_index: Option<i32>,
}

impl Post {
    /// Apply the non-ordering fields of an update, returning the merged record.
    pub fn merged(&self, input: &UpdatePost) -> Self {
        let mut post = self.clone();
        if let Some(title) = &input.title {
            post.title = title.clone();
        }
        if let Some(description) = &input.description {
            post.description = description.clone();
        }
        if let Some(content_type) = input.content_type {
            post.content_type = content_type;
        }
        if let Some(content) = &input.content {
            post.content = content.clone();
        }
        if let Some(thumbnail) = &input.thumbnail {
            post.thumbnail = thumbnail.clone();
        }
        post
    }

    /// Storage URIs owned by this post.
    pub fn asset_uris(&self) -> Vec<&str> {
        let mut uris = Vec::with_capacity(2);
        if let Some(thumbnail) = self.thumbnail.as_deref().filter(|t| !t.is_empty()) {
            uris.push(thumbnail);
        }
        if self.content_type == ContentType::File && !self.content.is_empty() {
            uris.push(self.content.as_str());
        }
        uris
    }
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::File => "file",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "url" => Ok(ContentType::Url),
            "file" => Ok(ContentType::File),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}
