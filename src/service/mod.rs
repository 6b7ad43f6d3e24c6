//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Entity services read through the cache and invalidate it after every
//! successful write; the notification service owns subscribe/send/read.

mod category;
mod comment;
mod movie;
mod notification;
mod source;

pub use category::CategoryService;
pub use comment::CommentService;
pub use movie::MovieService;
pub use notification::{NotificationService, SendOutcome, SubscribeOutcome};
pub use source::SourceService;

use crate::data::{Cache, Invalidation};
use crate::error::AppError;

/// Trim `value` and reject it when blank
fn require_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Drop stale views after a committed write
///
/// The write already succeeded; a failed invalidation only leaves entries
/// that age out with their TTL.
async fn invalidate_after_write(cache: &Cache, operation: &str, targets: &[Invalidation]) {
    if !cache.invalidate(targets).await {
        tracing::warn!(
            operation,
            targets = ?targets,
            "Cache invalidation incomplete; stale entries expire by TTL"
        );
    }
}
