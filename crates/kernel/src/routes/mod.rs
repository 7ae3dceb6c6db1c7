//! HTTP route handlers.

pub mod auth;
pub mod dashboard;
pub mod file;
pub mod health;
pub mod helpers;
pub mod page;
pub mod post;
