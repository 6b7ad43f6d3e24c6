//! Admin endpoint protection
//!
//! Handles:
//! - Static bearer token check for admin-only notification endpoints

mod middleware;

pub use middleware::AdminAccess;
