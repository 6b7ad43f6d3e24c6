//! API layer
//!
//! HTTP handlers for:
//! - Catalog (categories, movies, sources)
//! - Comments, replies and likes
//! - Notifications (subscriptions, broadcast, read state, SSE)
//! - Metrics (Prometheus)

mod categories;
mod comments;
mod dto;
mod extract;
pub mod metrics;
mod movies;
mod notifications;
mod sources;

pub use dto::*;
pub use extract::ClientIp;
pub use metrics::{metrics_router, track_http_metrics};

use axum::Router;

use crate::AppState;

/// Create the `/api` router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(categories::categories_router())
        .merge(movies::movies_router())
        .merge(sources::sources_router())
        .merge(comments::comments_router())
        .merge(notifications::notifications_router())
}
