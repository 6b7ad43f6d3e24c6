//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations
//! - Namespaced read-through cache (volatile)

pub mod cache;
mod database;
mod models;

pub use cache::{
    ALL_KEY, BackendCapabilities, Cache, CacheBackend, CacheError, CacheNamespace, Invalidation,
    MemoryBackend, NullBackend, movie_comments_key,
};
pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
