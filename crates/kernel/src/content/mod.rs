//! Ordered content management.
//!
//! This module provides:
//! - Slug generation unique within a scope
//! - Order-index planning for moves and removals
//! - Cascade deletion of pages, posts and their assets
//! - PageService and PostService tying these to the document store

pub mod cascade;
pub mod error;
pub mod ordering;
mod page_service;
mod post_service;
pub mod slug;

pub use cascade::DeleteOutcome;
pub use error::{ContentError, ContentResult, MAX_CONFLICT_RETRIES};
pub use page_service::PageService;
pub use post_service::PostService;
