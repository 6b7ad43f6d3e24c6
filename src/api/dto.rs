//! API request and response DTOs
//!
//! Request fields are optional at the serde level so a missing field turns
//! into a validation error naming it, rather than a generic body rejection.

use serde::{Deserialize, Serialize};

use crate::data::{NewMovie, NewSource, SourceType};
use crate::error::AppError;

/// Names of the required fields flagged absent, in declaration order
fn absent(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameCategoryRequest {
    pub id: Option<i64>,
    pub new_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCategoryRequest {
    pub category_id: Option<i64>,
}

// =============================================================================
// Movies and sources
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRequest {
    pub title: Option<String>,
    pub category_id: Option<i64>,
    #[serde(rename = "type")]
    pub movie_type: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub poster: Option<String>,
}

impl MovieRequest {
    pub fn into_new_movie(self) -> Result<NewMovie, AppError> {
        let missing = absent(&[
            ("title", self.title.is_some()),
            ("categoryId", self.category_id.is_some()),
            ("year", self.year.is_some()),
            ("rating", self.rating.is_some()),
            ("description", self.description.is_some()),
        ]);
        let (Some(title), Some(category_id), Some(year), Some(rating), Some(description)) =
            (self.title, self.category_id, self.year, self.rating, self.description)
        else {
            return Err(AppError::missing_fields(&missing));
        };

        Ok(NewMovie {
            category_id,
            title,
            movie_type: self.movie_type,
            year,
            rating,
            description,
            poster: self.poster,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    pub movie_id: Option<i64>,
    pub name: Option<String>,
    pub domain: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    pub part: Option<i64>,
    pub base_url: Option<String>,
    pub download_link: Option<String>,
    pub is_iframe: Option<bool>,
}

impl SourceRequest {
    pub fn into_new_source(self) -> Result<NewSource, AppError> {
        let missing = absent(&[
            ("movieId", self.movie_id.is_some()),
            ("name", self.name.is_some()),
            ("domain", self.domain.is_some()),
            ("type", self.source_type.is_some()),
            ("part", self.part.is_some()),
            ("baseUrl", self.base_url.is_some()),
        ]);
        let (Some(movie_id), Some(name), Some(domain), Some(source_type), Some(part), Some(base_url)) = (
            self.movie_id,
            self.name,
            self.domain,
            self.source_type,
            self.part,
            self.base_url,
        ) else {
            return Err(AppError::missing_fields(&missing));
        };

        let source_type = SourceType::parse(&source_type)
            .ok_or_else(|| AppError::Validation("type must be END or SEASON".to_string()))?;
        Ok(NewSource {
            movie_id,
            name,
            domain,
            source_type,
            part,
            base_url,
            download_link: self.download_link.unwrap_or_default(),
            is_iframe: self.is_iframe.unwrap_or(false),
        })
    }
}

// =============================================================================
// Comments
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub user_name: Option<String>,
    pub comment: Option<String>,
    pub movie_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    pub user_name: Option<String>,
    pub content: Option<String>,
}

/// Like response
#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub success: bool,
    pub likes: i64,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub endpoint: Option<String>,
    pub keys: Option<SubscriptionKeys>,
    pub browser_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub message: String,
    pub created: bool,
    pub subscription_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub browser_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserQuery {
    pub browser_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub room: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

/// Generic acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
