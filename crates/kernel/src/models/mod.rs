//! Data models.

pub mod page;
pub mod post;
pub mod user;

pub use page::{CreatePage, Page, UpdatePage};
pub use post::{ContentType, CreatePost, Post, UpdatePost};
pub use user::{AccountError, CreateUser, User};
