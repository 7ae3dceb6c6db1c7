//! Folio test utilities.
//!
//! Helpers for integration testing: request body builders for users,
//! pages and posts, plus assertions for ordered collections.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Create a test user with a unique username and email.
pub fn test_user(prefix: &str) -> TestUser {
    let suffix = &Uuid::now_v7().simple().to_string()[24..];
    let username = format!("{prefix}_{suffix}").to_lowercase();
    TestUser {
        email: format!("{username}@example.com"),
        username,
        password: "correct horse battery".to_string(),
    }
}

/// A test user's credentials.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl TestUser {
    /// Set the password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Body for the signup endpoint.
    pub fn signup_json(&self) -> JsonValue {
        json!({
            "username": self.username,
            "email": self.email,
            "password": self.password,
        })
    }

    /// Body for the login endpoint.
    pub fn login_json(&self) -> JsonValue {
        json!({
            "email": self.email,
            "password": self.password,
        })
    }
}

/// Create a test page with default values.
pub fn test_page(title: &str) -> TestPage {
    TestPage {
        title: title.to_string(),
        description: String::new(),
        thumbnail: None,
        is_private: false,
    }
}

/// A page builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestPage {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub is_private: bool,
}

impl TestPage {
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set the thumbnail storage URI.
    pub fn with_thumbnail(mut self, uri: &str) -> Self {
        self.thumbnail = Some(uri.to_string());
        self
    }

    /// Set as private.
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "title": self.title,
            "description": self.description,
            "thumbnail": self.thumbnail,
            "is_private": self.is_private,
        })
    }
}

/// Create a text post with default values.
pub fn test_post(title: &str) -> TestPost {
    TestPost {
        title: title.to_string(),
        description: String::new(),
        content_type: "text".to_string(),
        content: format!("{title} body"),
        thumbnail: None,
    }
}

/// A post builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestPost {
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub content: String,
    pub thumbnail: Option<String>,
}

impl TestPost {
    /// Make this a link post.
    pub fn url(mut self, url: &str) -> Self {
        self.content_type = "url".to_string();
        self.content = url.to_string();
        self
    }

    /// Make this a file post pointing at a storage URI.
    pub fn file(mut self, uri: &str) -> Self {
        self.content_type = "file".to_string();
        self.content = uri.to_string();
        self
    }

    /// Set the thumbnail storage URI.
    pub fn with_thumbnail(mut self, uri: &str) -> Self {
        self.thumbnail = Some(uri.to_string());
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "title": self.title,
            "description": self.description,
            "content_type": self.content_type,
            "content": self.content,
            "thumbnail": self.thumbnail,
        })
    }
}

/// Assertion helpers for ordered collections.
pub mod assert {
    use serde_json::Value;

    /// The `order_index` of every object in a JSON array, in array order.
    pub fn order_indices(items: &Value) -> Vec<i64> {
        items
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("order_index").and_then(Value::as_i64))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Assert that a JSON array of items is ordered `1..=N`.
    pub fn dense(items: &Value) {
        let indices = order_indices(items);
        let expected: Vec<i64> = (1..).take(indices.len()).collect();
        assert_eq!(
            indices, expected,
            "Expected order indices 1..={}, got: {indices:?}",
            expected.len()
        );
    }

    /// Assert that a JSON array of items has these slugs, in order.
    pub fn slugs(items: &Value, expected: &[&str]) {
        let actual: Vec<&str> = items
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("slug").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(actual, expected, "Slug order mismatch");
    }

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_builder_is_unique() {
        let a = test_user("Alice");
        let b = test_user("Alice");
        assert_ne!(a.username, b.username);
        assert!(a.username.starts_with("alice_"));
        assert_eq!(a.signup_json()["email"], a.email.as_str());
        assert_eq!(a.with_password("x").login_json()["password"], "x");
    }

    #[test]
    fn test_page_builder() {
        let page = test_page("Home").private().with_thumbnail("local://t.png");
        let body = page.to_json();
        assert_eq!(body["is_private"], true);
        assert_eq!(body["thumbnail"], "local://t.png");
    }

    #[test]
    fn test_post_builder() {
        let post = test_post("Doc").file("local://post-files/doc.pdf");
        let body = post.to_json();
        assert_eq!(body["content_type"], "file");
        assert_eq!(body["content"], "local://post-files/doc.pdf");
        assert!(body["thumbnail"].is_null());
    }

    #[test]
    fn test_dense_assertion() {
        let items = json!([
            {"slug": "a", "order_index": 1},
            {"slug": "b", "order_index": 2},
        ]);
        assert::dense(&items);
        assert::slugs(&items, &["a", "b"]);
        assert_eq!(assert::order_indices(&json!([])), Vec::<i64>::new());
    }
}
