//! Notification endpoints
//!
//! Subscriptions, admin broadcast, per-browser read state and the
//! realtime SSE stream.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use futures::stream::{Stream, StreamExt};

use super::dto::{
    BrowserQuery, MarkReadRequest, SendNotificationRequest, StreamQuery, SubscribeRequest,
    SubscribeResponse, SuccessResponse, UnreadCountResponse, UnsubscribeRequest,
    UnsubscribeResponse,
};
use crate::AppState;
use crate::auth::AdminAccess;
use crate::data::NotificationWithState;
use crate::error::AppError;
use crate::realtime::NEW_NOTIFICATION_EVENT;
use crate::service::SendOutcome;

/// Routes:
/// - GET /notifications?browserId=
/// - GET /notifications/unread_count?browserId=
/// - GET /notifications/stream?room=
/// - POST /notifications/subscribe
/// - POST /notifications/unsubscribe
/// - POST /notifications/send (admin)
/// - POST /notifications/clear (admin)
/// - POST /notifications/:id/read
pub fn notifications_router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread_count", get(unread_count))
        .route("/notifications/stream", get(stream_notifications))
        .route("/notifications/subscribe", post(subscribe))
        .route("/notifications/unsubscribe", post(unsubscribe))
        .route("/notifications/send", post(send_notification))
        .route("/notifications/clear", post(clear_notifications))
        .route("/notifications/:id/read", post(mark_read))
}

// =============================================================================
// Subscriptions
// =============================================================================

/// POST /notifications/subscribe
///
/// 201 for a new browser, 200 when the browser was already registered.
async fn subscribe(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SubscribeRequest>, AppError>,
) -> Result<(StatusCode, Json<SubscribeResponse>), AppError> {
    let (p256dh, auth) = req
        .keys
        .map(|keys| (keys.p256dh, keys.auth))
        .unwrap_or_default();

    let outcome = state
        .notifications
        .subscribe(
            req.endpoint.as_deref().unwrap_or_default(),
            p256dh.as_deref().unwrap_or_default(),
            auth.as_deref().unwrap_or_default(),
            req.browser_id.as_deref().unwrap_or_default(),
        )
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "Subscription created")
    } else {
        (StatusCode::OK, "Subscription already exists")
    };
    Ok((
        status,
        Json(SubscribeResponse {
            message: message.to_string(),
            created: outcome.created,
            subscription_id: outcome.subscription.id,
        }),
    ))
}

async fn unsubscribe(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UnsubscribeRequest>, AppError>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let removed = state
        .notifications
        .unsubscribe(req.endpoint.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(UnsubscribeResponse { removed }))
}

// =============================================================================
// Broadcast (admin)
// =============================================================================

/// POST /notifications/send
///
/// Persists the notification, emits it to realtime listeners and pushes it
/// to active subscriptions before responding.
async fn send_notification(
    State(state): State<AppState>,
    _admin: AdminAccess,
    WithRejection(Json(req), _): WithRejection<Json<SendNotificationRequest>, AppError>,
) -> Result<(StatusCode, Json<SendOutcome>), AppError> {
    let outcome = state
        .notifications
        .send(
            req.title.as_deref().unwrap_or_default(),
            req.message.as_deref().unwrap_or_default(),
            req.url.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn clear_notifications(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> Result<Json<SuccessResponse>, AppError> {
    state.notifications.clear().await?;
    Ok(Json(SuccessResponse::new("All notifications cleared")))
}

// =============================================================================
// Read state
// =============================================================================

async fn mark_read(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<MarkReadRequest>, AppError>,
) -> Result<Json<SuccessResponse>, AppError> {
    let created = state
        .notifications
        .mark_read(id, req.browser_id.as_deref().unwrap_or_default())
        .await?;
    let message = if created {
        "Notification marked as read"
    } else {
        "Notification already read"
    };
    Ok(Json(SuccessResponse::new(message)))
}

async fn list_notifications(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<BrowserQuery>, AppError>,
) -> Result<Json<Vec<NotificationWithState>>, AppError> {
    Ok(Json(
        state
            .notifications
            .list(params.browser_id.as_deref())
            .await?,
    ))
}

async fn unread_count(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<BrowserQuery>, AppError>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let count = state
        .notifications
        .unread_count(params.browser_id.as_deref())
        .await?;
    Ok(Json(UnreadCountResponse { count }))
}

// =============================================================================
// Realtime
// =============================================================================

/// GET /notifications/stream?room=
///
/// Server-Sent Events; each notification arrives as a `new-notification`
/// event carrying the JSON payload.
async fn stream_notifications(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<StreamQuery>, AppError>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let room = params.room.filter(|r| !r.trim().is_empty());
    tracing::debug!(room = ?room, "Realtime listener connected");

    let stream = state
        .hub
        .listen(room)
        .into_stream()
        .filter_map(|payload| async move {
            match Event::default()
                .event(NEW_NOTIFICATION_EVENT)
                .json_data(&payload)
            {
                Ok(event) => Some(Ok::<_, Infallible>(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode realtime event");
                    None
                }
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
