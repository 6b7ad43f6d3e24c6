//! Comment, reply and like endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_extra::extract::WithRejection;

use super::dto::{CreateCommentRequest, CreateReplyRequest, LikeResponse};
use super::extract::ClientIp;
use crate::AppState;
use crate::data::{Comment, CommentThread, Reply};
use crate::error::AppError;

/// Routes:
/// - GET/POST /comments
/// - GET /movies/:id/comments
/// - DELETE /comments/:id
/// - POST /comments/:id/like
/// - POST /comments/:id/replies
/// - DELETE /comments/:id/replies/:reply_id
/// - POST /comments/:id/replies/:reply_id/like
pub fn comments_router() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/movies/:id/comments", get(list_movie_comments))
        .route("/comments/:id", delete(delete_comment))
        .route("/comments/:id/like", post(like_comment))
        .route("/comments/:id/replies", post(create_reply))
        .route("/comments/:id/replies/:reply_id", delete(delete_reply))
        .route("/comments/:id/replies/:reply_id/like", post(like_reply))
}

async fn list_comments(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentThread>>, AppError> {
    Ok(Json(state.comments.list().await?))
}

async fn list_movie_comments(
    State(state): State<AppState>,
    WithRejection(Path(movie_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Vec<CommentThread>>, AppError> {
    Ok(Json(state.comments.list_for_movie(movie_id).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommentRequest>, AppError>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let (user_name, comment, movie_id) = match (req.user_name, req.comment, req.movie_id) {
        (Some(user_name), Some(comment), Some(movie_id)) => (user_name, comment, movie_id),
        (user_name, comment, movie_id) => {
            let missing: Vec<&str> = [
                ("userName", user_name.is_none()),
                ("comment", comment.is_none()),
                ("movieId", movie_id.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            return Err(AppError::missing_fields(&missing));
        }
    };

    let created = state
        .comments
        .create(movie_id, &user_name, &comment)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_comment(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<StatusCode, AppError> {
    state.comments.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /comments/:id/like
///
/// One like per client IP; a repeat is a 409.
async fn like_comment(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<LikeResponse>, AppError> {
    let likes = state.comments.like(id, &ip).await?;
    Ok(Json(LikeResponse {
        success: true,
        likes,
    }))
}

async fn create_reply(
    State(state): State<AppState>,
    WithRejection(Path(comment_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<CreateReplyRequest>, AppError>,
) -> Result<(StatusCode, Json<Reply>), AppError> {
    let (user_name, content) = match (req.user_name, req.content) {
        (Some(user_name), Some(content)) => (user_name, content),
        (None, Some(_)) => return Err(AppError::missing_fields(&["userName"])),
        (Some(_), None) => return Err(AppError::missing_fields(&["content"])),
        (None, None) => return Err(AppError::missing_fields(&["userName", "content"])),
    };

    let reply = state
        .comments
        .create_reply(comment_id, &user_name, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn delete_reply(
    State(state): State<AppState>,
    WithRejection(Path((comment_id, reply_id)), _): WithRejection<Path<(i64, i64)>, AppError>,
) -> Result<StatusCode, AppError> {
    state.comments.delete_reply(comment_id, reply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_reply(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    WithRejection(Path((comment_id, reply_id)), _): WithRejection<Path<(i64, i64)>, AppError>,
) -> Result<Json<LikeResponse>, AppError> {
    let likes = state.comments.like_reply(comment_id, reply_id, &ip).await?;
    Ok(Json(LikeResponse {
        success: true,
        likes,
    }))
}
