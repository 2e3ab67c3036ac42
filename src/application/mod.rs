//! Application services: rendering, content assembly and the write paths.

pub mod comments;
pub mod content;
pub mod error;
pub mod markdown;
pub mod rate_limit;
pub mod render;
pub mod revalidate;
pub mod sitemap;
pub mod store;
pub mod summary;
