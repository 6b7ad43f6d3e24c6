//! Data models
//!
//! Rust structs representing database rows, the write inputs services accept,
//! and the denormalized views stored in the cache.
//! Rows use SQLite integer ids and chrono timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// A movie category
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Cached category list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
}

impl From<Category> for CategorySummary {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

/// A catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    /// Free-form kind label ("movie", "series", ...)
    #[serde(rename = "type")]
    pub movie_type: Option<String>,
    pub year: i64,
    pub rating: f64,
    pub description: String,
    pub poster: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Movie row joined with its category name
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieRecord {
    #[sqlx(flatten)]
    pub movie: Movie,
    pub category_name: String,
}

/// Movie with category name and sources, as served to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieView {
    #[serde(flatten)]
    pub movie: Movie,
    pub category_name: String,
    pub sources: Vec<Source>,
}

impl MovieView {
    pub fn new(record: MovieRecord, sources: Vec<Source>) -> Self {
        Self {
            movie: record.movie,
            category_name: record.category_name,
            sources,
        }
    }
}

/// Write input for movie create and update
#[derive(Debug, Clone)]
pub struct NewMovie {
    pub category_id: i64,
    pub title: String,
    pub movie_type: Option<String>,
    pub year: i64,
    pub rating: f64,
    pub description: String,
    pub poster: Option<String>,
}

/// Source kind: a complete release or one part of a season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum SourceType {
    End,
    Season,
}

impl SourceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "END" => Some(Self::End),
            "SEASON" => Some(Self::Season),
            _ => None,
        }
    }
}

/// A streaming or download location for a movie
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: i64,
    pub movie_id: i64,
    pub name: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// 1-based part number
    pub part: i64,
    pub base_url: String,
    pub download_link: String,
    pub is_iframe: bool,
    pub created_at: DateTime<Utc>,
}

/// Write input for source create and update
#[derive(Debug, Clone)]
pub struct NewSource {
    pub movie_id: i64,
    pub name: String,
    pub domain: String,
    pub source_type: SourceType,
    pub part: i64,
    pub base_url: String,
    pub download_link: String,
    pub is_iframe: bool,
}

// =============================================================================
// Discussion
// =============================================================================

/// A user comment on a movie
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub movie_id: i64,
    pub user_name: String,
    pub comment: String,
    pub comment_like: i64,
    pub created_at: DateTime<Utc>,
}

/// A reply to a comment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: i64,
    pub comment_id: i64,
    pub user_name: String,
    pub content: String,
    pub reply_like: i64,
    pub created_at: DateTime<Utc>,
}

/// Comment with its replies, oldest reply first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Reply>,
}

// =============================================================================
// Notifications
// =============================================================================

/// A browser push subscription, one per browser id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub browser_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write input for subscribe
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub browser_id: String,
}

/// A broadcast message
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body delivered to push services and realtime listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn from_notification(notification: &Notification, default_url: &str) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            url: notification
                .url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            created_at: notification.created_at,
        }
    }
}

/// Notification with read state resolved for one browser
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationWithState {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isRead")]
    pub is_read: bool,
}
