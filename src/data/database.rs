//! SQLite database operations
//!
//! All database access goes through this module.
//! Multi-statement operations (likes, clear, source moves) run inside a
//! single transaction; uniqueness races are settled by schema constraints.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;

use super::models::*;
use crate::config::ResubscribePolicy;
use crate::error::AppError;

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Map an insert failure: a dangling parent reference becomes `NotFound(parent)`.
fn classify_insert(error: sqlx::Error, parent: &'static str) -> AppError {
    if is_foreign_key_violation(&error) {
        AppError::NotFound(parent)
    } else {
        AppError::Database(error)
    }
}

const MOVIE_RECORD_SELECT: &str = r#"
    SELECT m.*, c.name AS category_name
    FROM movies m
    JOIN categories c ON c.id = m.category_id
"#;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite file at `path`, creating it if needed, and run migrations.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// All categories, newest first
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    pub async fn insert_category(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Category, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, created_at) VALUES (?, ?) RETURNING *",
        )
        .bind(name)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Rename a category
    ///
    /// # Returns
    /// The updated category, or None if it does not exist
    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ? WHERE id = ? RETURNING *",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Delete a category
    ///
    /// # Errors
    /// `Conflict` while movies still reference the category
    pub async fn delete_category(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Category still has movies".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Movies
    // =========================================================================

    /// All movies with their category name, newest first
    pub async fn list_movie_records(&self) -> Result<Vec<MovieRecord>, AppError> {
        let query = format!("{MOVIE_RECORD_SELECT} ORDER BY m.created_at DESC, m.id DESC");
        let records = sqlx::query_as::<_, MovieRecord>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// The `limit` newest movies with their category name
    pub async fn recent_movie_records(&self, limit: i64) -> Result<Vec<MovieRecord>, AppError> {
        let query =
            format!("{MOVIE_RECORD_SELECT} ORDER BY m.created_at DESC, m.id DESC LIMIT ?");
        let records = sqlx::query_as::<_, MovieRecord>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    pub async fn get_movie_record(&self, id: i64) -> Result<Option<MovieRecord>, AppError> {
        let query = format!("{MOVIE_RECORD_SELECT} WHERE m.id = ?");
        let record = sqlx::query_as::<_, MovieRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn get_movie(&self, id: i64) -> Result<Option<Movie>, AppError> {
        let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(movie)
    }

    /// Insert a movie
    ///
    /// # Errors
    /// `NotFound("category")` when the category does not exist
    pub async fn insert_movie(
        &self,
        movie: &NewMovie,
        created_at: DateTime<Utc>,
    ) -> Result<Movie, AppError> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (
                category_id, title, movie_type, year, rating, description, poster, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(movie.category_id)
        .bind(&movie.title)
        .bind(&movie.movie_type)
        .bind(movie.year)
        .bind(movie.rating)
        .bind(&movie.description)
        .bind(&movie.poster)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "category"))?;

        Ok(movie)
    }

    /// Update a movie in place
    ///
    /// # Returns
    /// The updated movie, or None if it does not exist
    pub async fn update_movie(&self, id: i64, movie: &NewMovie) -> Result<Option<Movie>, AppError> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies SET
                category_id = ?, title = ?, movie_type = ?, year = ?,
                rating = ?, description = ?, poster = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(movie.category_id)
        .bind(&movie.title)
        .bind(&movie.movie_type)
        .bind(movie.year)
        .bind(movie.rating)
        .bind(&movie.description)
        .bind(&movie.poster)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "category"))?;

        Ok(movie)
    }

    /// Delete a movie. Its sources, comments and replies cascade.
    pub async fn delete_movie(&self, id: i64) -> Result<Option<Movie>, AppError> {
        let movie = sqlx::query_as::<_, Movie>("DELETE FROM movies WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(movie)
    }

    // =========================================================================
    // Sources
    // =========================================================================

    pub async fn list_sources(&self) -> Result<Vec<Source>, AppError> {
        let sources = sqlx::query_as::<_, Source>(
            "SELECT * FROM sources ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Sources of one movie, ordered by part
    pub async fn list_sources_for_movie(&self, movie_id: i64) -> Result<Vec<Source>, AppError> {
        let sources = sqlx::query_as::<_, Source>(
            "SELECT * FROM sources WHERE movie_id = ? ORDER BY part ASC, id ASC",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Insert a source
    ///
    /// # Errors
    /// `NotFound("movie")` when the movie does not exist
    pub async fn insert_source(
        &self,
        source: &NewSource,
        created_at: DateTime<Utc>,
    ) -> Result<Source, AppError> {
        let source = sqlx::query_as::<_, Source>(
            r#"
            INSERT INTO sources (
                movie_id, name, domain, source_type, part,
                base_url, download_link, is_iframe, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(source.movie_id)
        .bind(&source.name)
        .bind(&source.domain)
        .bind(source.source_type)
        .bind(source.part)
        .bind(&source.base_url)
        .bind(&source.download_link)
        .bind(source.is_iframe)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "movie"))?;

        Ok(source)
    }

    /// Update a source, possibly moving it to another movie
    ///
    /// # Returns
    /// `(previous movie id, updated source)`, or None if the source does not exist
    pub async fn update_source(
        &self,
        id: i64,
        source: &NewSource,
    ) -> Result<Option<(i64, Source)>, AppError> {
        let mut tx = self.pool.begin().await?;

        let previous_movie_id: Option<i64> =
            sqlx::query_scalar("SELECT movie_id FROM sources WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous_movie_id) = previous_movie_id else {
            return Ok(None);
        };

        let updated = sqlx::query_as::<_, Source>(
            r#"
            UPDATE sources SET
                movie_id = ?, name = ?, domain = ?, source_type = ?, part = ?,
                base_url = ?, download_link = ?, is_iframe = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(source.movie_id)
        .bind(&source.name)
        .bind(&source.domain)
        .bind(source.source_type)
        .bind(source.part)
        .bind(&source.base_url)
        .bind(&source.download_link)
        .bind(source.is_iframe)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify_insert(e, "movie"))?;

        tx.commit().await?;
        Ok(Some((previous_movie_id, updated)))
    }

    pub async fn delete_source(&self, id: i64) -> Result<Option<Source>, AppError> {
        let source = sqlx::query_as::<_, Source>("DELETE FROM sources WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(source)
    }

    // =========================================================================
    // Comments and replies
    // =========================================================================

    /// All comments, newest first
    pub async fn list_comments(&self) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    pub async fn list_comments_for_movie(&self, movie_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE movie_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    /// All replies, oldest first
    pub async fn list_replies(&self) -> Result<Vec<Reply>, AppError> {
        let replies = sqlx::query_as::<_, Reply>(
            "SELECT * FROM replies ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(replies)
    }

    /// Replies to comments of one movie, oldest first
    pub async fn list_replies_for_movie(&self, movie_id: i64) -> Result<Vec<Reply>, AppError> {
        let replies = sqlx::query_as::<_, Reply>(
            r#"
            SELECT r.* FROM replies r
            JOIN comments c ON c.id = r.comment_id
            WHERE c.movie_id = ?
            ORDER BY r.created_at ASC, r.id ASC
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(replies)
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    /// Insert a comment
    ///
    /// # Errors
    /// `NotFound("movie")` when the movie does not exist
    pub async fn insert_comment(
        &self,
        movie_id: i64,
        user_name: &str,
        comment: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (movie_id, user_name, comment, comment_like, created_at)
            VALUES (?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(movie_id)
        .bind(user_name)
        .bind(comment)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "movie"))?;

        Ok(comment)
    }

    /// Delete a comment. Replies and likes cascade.
    pub async fn delete_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment =
            sqlx::query_as::<_, Comment>("DELETE FROM comments WHERE id = ? RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(comment)
    }

    /// Insert a reply
    ///
    /// # Errors
    /// `NotFound("comment")` when the comment does not exist
    pub async fn insert_reply(
        &self,
        comment_id: i64,
        user_name: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reply, AppError> {
        let reply = sqlx::query_as::<_, Reply>(
            r#"
            INSERT INTO replies (comment_id, user_name, content, reply_like, created_at)
            VALUES (?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(comment_id)
        .bind(user_name)
        .bind(content)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "comment"))?;

        Ok(reply)
    }

    /// Delete a reply belonging to `comment_id`
    pub async fn delete_reply(
        &self,
        comment_id: i64,
        reply_id: i64,
    ) -> Result<Option<Reply>, AppError> {
        let reply = sqlx::query_as::<_, Reply>(
            "DELETE FROM replies WHERE id = ? AND comment_id = ? RETURNING *",
        )
        .bind(reply_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reply)
    }

    /// Record a like on a comment from `ip`
    ///
    /// Counter bump and like row are one transaction: a duplicate like rolls
    /// back the bump.
    ///
    /// # Returns
    /// The new like count
    pub async fn like_comment(
        &self,
        comment_id: i64,
        ip: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let likes: Option<i64> = sqlx::query_scalar(
            "UPDATE comments SET comment_like = comment_like + 1 WHERE id = ? RETURNING comment_like",
        )
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(likes) = likes else {
            return Err(AppError::NotFound("comment"));
        };

        sqlx::query("INSERT INTO comment_likes (comment_id, ip, created_at) VALUES (?, ?, ?)")
            .bind(comment_id)
            .bind(ip)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("You already liked this comment".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        tx.commit().await?;
        Ok(likes)
    }

    /// Record a like on a reply of `comment_id` from `ip`
    ///
    /// # Returns
    /// The new like count
    pub async fn like_reply(
        &self,
        comment_id: i64,
        reply_id: i64,
        ip: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let likes: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE replies SET reply_like = reply_like + 1
            WHERE id = ? AND comment_id = ?
            RETURNING reply_like
            "#,
        )
        .bind(reply_id)
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(likes) = likes else {
            return Err(AppError::NotFound("reply"));
        };

        sqlx::query("INSERT INTO reply_likes (reply_id, ip, created_at) VALUES (?, ?, ?)")
            .bind(reply_id)
            .bind(ip)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("You already liked this reply".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        tx.commit().await?;
        Ok(likes)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Insert a subscription unless its browser id is already known
    ///
    /// A single statement, so concurrent subscribes for one browser id
    /// create exactly one row.
    ///
    /// # Returns
    /// `(subscription, created)`
    pub async fn upsert_subscription(
        &self,
        subscription: &NewSubscription,
        policy: ResubscribePolicy,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, bool), AppError> {
        match policy {
            ResubscribePolicy::Keep => {
                let inserted = sqlx::query_as::<_, Subscription>(
                    r#"
                    INSERT INTO subscriptions (
                        endpoint, p256dh_key, auth_key, browser_id, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(browser_id) DO NOTHING
                    RETURNING *
                    "#,
                )
                .bind(&subscription.endpoint)
                .bind(&subscription.p256dh_key)
                .bind(&subscription.auth_key)
                .bind(&subscription.browser_id)
                .bind(now)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;

                if let Some(inserted) = inserted {
                    return Ok((inserted, true));
                }

                let existing = self
                    .get_subscription_by_browser_id(&subscription.browser_id)
                    .await?
                    .ok_or(AppError::NotFound("subscription"))?;
                Ok((existing, false))
            }
            ResubscribePolicy::Refresh => {
                let row = sqlx::query_as::<_, Subscription>(
                    r#"
                    INSERT INTO subscriptions (
                        endpoint, p256dh_key, auth_key, browser_id, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(browser_id) DO UPDATE SET
                        endpoint = excluded.endpoint,
                        p256dh_key = excluded.p256dh_key,
                        auth_key = excluded.auth_key,
                        updated_at = excluded.updated_at
                    RETURNING *
                    "#,
                )
                .bind(&subscription.endpoint)
                .bind(&subscription.p256dh_key)
                .bind(&subscription.auth_key)
                .bind(&subscription.browser_id)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await?;

                // An updated row keeps its original created_at
                let created = row.created_at == now;
                Ok((row, created))
            }
        }
    }

    pub async fn get_subscription_by_browser_id(
        &self,
        browser_id: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE browser_id = ?")
                .bind(browser_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(subscription)
    }

    /// Subscriptions touched at or after `since`
    pub async fn list_active_subscriptions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, AppError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE julianday(updated_at) >= julianday(?) ORDER BY id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// Delete every subscription registered for `endpoint`
    pub async fn delete_subscriptions_by_endpoint(&self, endpoint: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_subscription(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub async fn insert_notification(
        &self,
        title: &str,
        message: &str,
        url: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (title, message, url, created_at) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(title)
        .bind(message)
        .bind(url)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    pub async fn get_notification(&self, id: i64) -> Result<Option<Notification>, AppError> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    /// Most recent notifications with read state for one subscription
    ///
    /// Without a subscription every entry reads as unread.
    pub async fn list_notifications_with_state(
        &self,
        subscription_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<NotificationWithState>, AppError> {
        let notifications = sqlx::query_as::<_, NotificationWithState>(
            r#"
            SELECT n.id, n.title, n.message, n.url, n.created_at,
                   COALESCE(un.is_read, 0) AS is_read
            FROM notifications n
            LEFT JOIN user_notifications un
                ON un.notification_id = n.id AND un.subscription_id = ?
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT ?
            "#,
        )
        .bind(subscription_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Record that a subscription read a notification
    ///
    /// # Returns
    /// true if a new read row was created, false if it already existed
    pub async fn mark_notification_read(
        &self,
        subscription_id: i64,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_notifications (
                subscription_id, notification_id, is_read, created_at, updated_at
            ) VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(subscription_id, notification_id) DO NOTHING
            "#,
        )
        .bind(subscription_id)
        .bind(notification_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| classify_insert(e, "notification"))?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete all read-state rows and all notifications in one transaction
    ///
    /// # Returns
    /// `(read rows deleted, notifications deleted)`
    pub async fn clear_notifications(&self) -> Result<(u64, u64), AppError> {
        let mut tx = self.pool.begin().await?;

        let read_rows = sqlx::query("DELETE FROM user_notifications")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let notifications = sqlx::query("DELETE FROM notifications")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok((read_rows, notifications))
    }

    /// Row counts of `(notifications, user_notifications)`
    pub async fn notification_row_counts(&self) -> Result<(i64, i64), AppError> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM notifications),
                (SELECT COUNT(*) FROM user_notifications)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
