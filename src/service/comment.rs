//! Comment service
//!
//! Handles comments, replies and likes. Threads are cached under
//! `comments:all` and per movie under `comments:movie:{id}`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use super::{invalidate_after_write, require_text};
use crate::data::{
    ALL_KEY, Cache, CacheNamespace, Comment, CommentThread, Database, Invalidation, Reply,
    movie_comments_key,
};
use crate::error::AppError;

fn thread_invalidations(movie_id: i64) -> Vec<Invalidation> {
    vec![
        Invalidation::list(CacheNamespace::Comments),
        Invalidation::key(CacheNamespace::Comments, movie_comments_key(movie_id)),
    ]
}

/// Attach replies (already oldest first) to their comments
fn build_threads(comments: Vec<Comment>, replies: Vec<Reply>) -> Vec<CommentThread> {
    let mut replies_by_comment: HashMap<i64, Vec<Reply>> = HashMap::new();
    for reply in replies {
        replies_by_comment
            .entry(reply.comment_id)
            .or_default()
            .push(reply);
    }

    comments
        .into_iter()
        .map(|comment| CommentThread {
            replies: replies_by_comment.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect()
}

/// Comment service
pub struct CommentService {
    db: Arc<Database>,
    cache: Arc<Cache>,
}

impl CommentService {
    pub fn new(db: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Every comment thread, newest comment first
    pub async fn list(&self) -> Result<Vec<CommentThread>, AppError> {
        self.cache
            .get_or_load(CacheNamespace::Comments, ALL_KEY, || async move {
                let comments = self.db.list_comments().await?;
                let replies = self.db.list_replies().await?;
                Ok(build_threads(comments, replies))
            })
            .await
    }

    /// Comment threads of one movie
    pub async fn list_for_movie(&self, movie_id: i64) -> Result<Vec<CommentThread>, AppError> {
        self.cache
            .get_or_load(
                CacheNamespace::Comments,
                &movie_comments_key(movie_id),
                || async move {
                    if self.db.get_movie(movie_id).await?.is_none() {
                        return Err(AppError::NotFound("movie"));
                    }
                    let comments = self.db.list_comments_for_movie(movie_id).await?;
                    let replies = self.db.list_replies_for_movie(movie_id).await?;
                    Ok(build_threads(comments, replies))
                },
            )
            .await
    }

    pub async fn create(
        &self,
        movie_id: i64,
        user_name: &str,
        comment: &str,
    ) -> Result<Comment, AppError> {
        let user_name = require_text("userName", user_name)?;
        let comment = require_text("comment", comment)?;

        let created = self
            .db
            .insert_comment(movie_id, &user_name, &comment, Utc::now())
            .await?;

        invalidate_after_write(&self.cache, "comment.create", &thread_invalidations(movie_id))
            .await;
        tracing::info!(comment_id = created.id, movie_id, "Comment created");
        Ok(created)
    }

    /// Delete a comment and its replies
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let deleted = self
            .db
            .delete_comment(id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;

        invalidate_after_write(
            &self.cache,
            "comment.delete",
            &thread_invalidations(deleted.movie_id),
        )
        .await;
        tracing::info!(comment_id = id, movie_id = deleted.movie_id, "Comment deleted");
        Ok(())
    }

    /// Like a comment once per client IP
    ///
    /// # Returns
    /// The new like count
    ///
    /// # Errors
    /// `NotFound` for a missing comment, `Conflict` for a repeated like
    pub async fn like(&self, comment_id: i64, ip: &str) -> Result<i64, AppError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;

        let likes = self.db.like_comment(comment_id, ip, Utc::now()).await?;

        invalidate_after_write(
            &self.cache,
            "comment.like",
            &thread_invalidations(comment.movie_id),
        )
        .await;
        tracing::debug!(comment_id, likes, "Comment liked");
        Ok(likes)
    }

    // =========================================================================
    // Replies
    // =========================================================================

    pub async fn create_reply(
        &self,
        comment_id: i64,
        user_name: &str,
        content: &str,
    ) -> Result<Reply, AppError> {
        let user_name = require_text("userName", user_name)?;
        let content = require_text("content", content)?;

        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;

        let reply = self
            .db
            .insert_reply(comment_id, &user_name, &content, Utc::now())
            .await?;

        invalidate_after_write(
            &self.cache,
            "reply.create",
            &thread_invalidations(comment.movie_id),
        )
        .await;
        tracing::info!(reply_id = reply.id, comment_id, "Reply created");
        Ok(reply)
    }

    pub async fn delete_reply(&self, comment_id: i64, reply_id: i64) -> Result<(), AppError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;

        self.db
            .delete_reply(comment_id, reply_id)
            .await?
            .ok_or(AppError::NotFound("reply"))?;

        invalidate_after_write(
            &self.cache,
            "reply.delete",
            &thread_invalidations(comment.movie_id),
        )
        .await;
        tracing::info!(reply_id, comment_id, "Reply deleted");
        Ok(())
    }

    /// Like a reply once per client IP
    ///
    /// # Returns
    /// The new like count
    pub async fn like_reply(
        &self,
        comment_id: i64,
        reply_id: i64,
        ip: &str,
    ) -> Result<i64, AppError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;

        let likes = self
            .db
            .like_reply(comment_id, reply_id, ip, Utc::now())
            .await?;

        invalidate_after_write(
            &self.cache,
            "reply.like",
            &thread_invalidations(comment.movie_id),
        )
        .await;
        tracing::debug!(reply_id, comment_id, likes, "Reply liked");
        Ok(likes)
    }
}
