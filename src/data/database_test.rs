//! Database tests

use super::*;
use crate::config::ResubscribePolicy;
use crate::error::AppError;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn new_movie(category_id: i64, title: &str) -> NewMovie {
    NewMovie {
        category_id,
        title: title.to_string(),
        movie_type: Some("movie".to_string()),
        year: 2021,
        rating: 7.5,
        description: "A test movie".to_string(),
        poster: None,
    }
}

fn new_source(movie_id: i64, part: i64) -> NewSource {
    NewSource {
        movie_id,
        name: "Server A".to_string(),
        domain: "stream.example.com".to_string(),
        source_type: SourceType::Season,
        part,
        base_url: "https://stream.example.com/v/1".to_string(),
        download_link: String::new(),
        is_iframe: true,
    }
}

fn new_subscription(browser_id: &str, endpoint: &str) -> NewSubscription {
    NewSubscription {
        endpoint: endpoint.to_string(),
        p256dh_key: "p256dh".to_string(),
        auth_key: "auth".to_string(),
        browser_id: browser_id.to_string(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    db.ping().await.unwrap();
}

#[tokio::test]
async fn test_category_crud() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    assert_eq!(category.name, "Drama");

    let renamed = db.rename_category(category.id, "Thriller").await.unwrap();
    assert_eq!(renamed.unwrap().name, "Thriller");
    assert!(db.rename_category(9999, "Nope").await.unwrap().is_none());

    assert!(db.delete_category(category.id).await.unwrap());
    assert!(db.get_category(category.id).await.unwrap().is_none());
    assert!(!db.delete_category(category.id).await.unwrap());
}

#[tokio::test]
async fn test_category_with_movies_cannot_be_deleted() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    db.insert_movie(&new_movie(category.id, "Heat"), Utc::now())
        .await
        .unwrap();

    let result = db.delete_category(category.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_movie_requires_existing_category() {
    let (db, _temp_dir) = create_test_db().await;

    let result = db.insert_movie(&new_movie(42, "Orphan"), Utc::now()).await;
    assert!(matches!(result, Err(AppError::NotFound("category"))));
}

#[tokio::test]
async fn test_movie_records_are_newest_first_with_category_name() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Action", Utc::now()).await.unwrap();
    let older = db
        .insert_movie(&new_movie(category.id, "Older"), Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    let newer = db
        .insert_movie(&new_movie(category.id, "Newer"), Utc::now())
        .await
        .unwrap();

    let records = db.list_movie_records().await.unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.movie.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert!(records.iter().all(|r| r.category_name == "Action"));

    let recent = db.recent_movie_records(1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].movie.id, newer.id);
}

#[tokio::test]
async fn test_movie_delete_cascades_to_sources_and_comments() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    let movie = db
        .insert_movie(&new_movie(category.id, "Heat"), Utc::now())
        .await
        .unwrap();
    db.insert_source(&new_source(movie.id, 1), Utc::now())
        .await
        .unwrap();
    let comment = db
        .insert_comment(movie.id, "ana", "great", Utc::now())
        .await
        .unwrap();
    db.insert_reply(comment.id, "bo", "agreed", Utc::now())
        .await
        .unwrap();

    assert!(db.delete_movie(movie.id).await.unwrap().is_some());

    assert!(db.list_sources_for_movie(movie.id).await.unwrap().is_empty());
    assert!(db.get_comment(comment.id).await.unwrap().is_none());
    assert!(db.list_replies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_source_update_reports_previous_movie() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    let first = db
        .insert_movie(&new_movie(category.id, "First"), Utc::now())
        .await
        .unwrap();
    let second = db
        .insert_movie(&new_movie(category.id, "Second"), Utc::now())
        .await
        .unwrap();
    let source = db
        .insert_source(&new_source(first.id, 1), Utc::now())
        .await
        .unwrap();
    assert_eq!(source.source_type, SourceType::Season);
    assert!(source.is_iframe);

    let (previous, updated) = db
        .update_source(source.id, &new_source(second.id, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous, first.id);
    assert_eq!(updated.movie_id, second.id);
    assert_eq!(updated.part, 2);

    assert!(db.update_source(9999, &new_source(second.id, 1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_source_part_must_be_positive() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    let movie = db
        .insert_movie(&new_movie(category.id, "Heat"), Utc::now())
        .await
        .unwrap();

    let result = db.insert_source(&new_source(movie.id, 0), Utc::now()).await;
    assert!(matches!(result, Err(AppError::Database(_))));
}

#[tokio::test]
async fn test_comment_like_is_unique_per_ip() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    let movie = db
        .insert_movie(&new_movie(category.id, "Heat"), Utc::now())
        .await
        .unwrap();
    let comment = db
        .insert_comment(movie.id, "ana", "great", Utc::now())
        .await
        .unwrap();

    assert_eq!(db.like_comment(comment.id, "10.0.0.1", Utc::now()).await.unwrap(), 1);
    let duplicate = db.like_comment(comment.id, "10.0.0.1", Utc::now()).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert_eq!(db.like_comment(comment.id, "10.0.0.2", Utc::now()).await.unwrap(), 2);

    // Rolled back bump leaves the counter untouched
    let stored = db.get_comment(comment.id).await.unwrap().unwrap();
    assert_eq!(stored.comment_like, 2);

    let missing = db.like_comment(9999, "10.0.0.1", Utc::now()).await;
    assert!(matches!(missing, Err(AppError::NotFound("comment"))));
}

#[tokio::test]
async fn test_reply_like_requires_matching_comment() {
    let (db, _temp_dir) = create_test_db().await;

    let category = db.insert_category("Drama", Utc::now()).await.unwrap();
    let movie = db
        .insert_movie(&new_movie(category.id, "Heat"), Utc::now())
        .await
        .unwrap();
    let first = db
        .insert_comment(movie.id, "ana", "great", Utc::now())
        .await
        .unwrap();
    let second = db
        .insert_comment(movie.id, "bo", "meh", Utc::now())
        .await
        .unwrap();
    let reply = db
        .insert_reply(first.id, "cy", "agreed", Utc::now())
        .await
        .unwrap();

    let wrong_parent = db.like_reply(second.id, reply.id, "10.0.0.1", Utc::now()).await;
    assert!(matches!(wrong_parent, Err(AppError::NotFound("reply"))));

    assert_eq!(
        db.like_reply(first.id, reply.id, "10.0.0.1", Utc::now())
            .await
            .unwrap(),
        1
    );
    let duplicate = db.like_reply(first.id, reply.id, "10.0.0.1", Utc::now()).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_subscribe_keep_policy_is_insert_if_absent() {
    let (db, _temp_dir) = create_test_db().await;

    let (first, created) = db
        .upsert_subscription(
            &new_subscription("browser-1", "https://push.example.com/a"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(created);

    let (second, created) = db
        .upsert_subscription(
            &new_subscription("browser-1", "https://push.example.com/b"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.endpoint, "https://push.example.com/a");
}

#[tokio::test]
async fn test_subscribe_refresh_policy_overwrites_keys() {
    let (db, _temp_dir) = create_test_db().await;

    let (first, _) = db
        .upsert_subscription(
            &new_subscription("browser-1", "https://push.example.com/a"),
            ResubscribePolicy::Refresh,
            Utc::now() - Duration::days(1),
        )
        .await
        .unwrap();

    let (refreshed, created) = db
        .upsert_subscription(
            &new_subscription("browser-1", "https://push.example.com/b"),
            ResubscribePolicy::Refresh,
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(refreshed.id, first.id);
    assert_eq!(refreshed.endpoint, "https://push.example.com/b");
    assert!(refreshed.updated_at > first.updated_at);
}

#[tokio::test]
async fn test_active_subscriptions_respect_window() {
    let (db, _temp_dir) = create_test_db().await;

    db.upsert_subscription(
        &new_subscription("stale", "https://push.example.com/stale"),
        ResubscribePolicy::Keep,
        Utc::now() - Duration::days(120),
    )
    .await
    .unwrap();
    db.upsert_subscription(
        &new_subscription("fresh", "https://push.example.com/fresh"),
        ResubscribePolicy::Keep,
        Utc::now() - Duration::days(3),
    )
    .await
    .unwrap();

    let active = db
        .list_active_subscriptions(Utc::now() - Duration::days(90))
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].browser_id, "fresh");
}

#[tokio::test]
async fn test_read_state_is_per_subscription() {
    let (db, _temp_dir) = create_test_db().await;

    let (alice, _) = db
        .upsert_subscription(
            &new_subscription("alice", "https://push.example.com/a"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    let (bob, _) = db
        .upsert_subscription(
            &new_subscription("bob", "https://push.example.com/b"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    let notification = db
        .insert_notification("New movie", "Heat is out", None, Utc::now())
        .await
        .unwrap();

    assert!(db.mark_notification_read(alice.id, notification.id, Utc::now()).await.unwrap());
    assert!(!db.mark_notification_read(alice.id, notification.id, Utc::now()).await.unwrap());

    let for_alice = db
        .list_notifications_with_state(Some(alice.id), 20)
        .await
        .unwrap();
    let for_bob = db.list_notifications_with_state(Some(bob.id), 20).await.unwrap();
    let anonymous = db.list_notifications_with_state(None, 20).await.unwrap();

    assert!(for_alice[0].is_read);
    assert!(!for_bob[0].is_read);
    assert!(!anonymous[0].is_read);
}

#[tokio::test]
async fn test_clear_notifications_removes_all_rows() {
    let (db, _temp_dir) = create_test_db().await;

    let (subscription, _) = db
        .upsert_subscription(
            &new_subscription("alice", "https://push.example.com/a"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    for i in 0..3 {
        let notification = db
            .insert_notification(&format!("title {i}"), "body", Some("/movies/1"), Utc::now())
            .await
            .unwrap();
        db.mark_notification_read(subscription.id, notification.id, Utc::now())
            .await
            .unwrap();
    }

    let (read_rows, notifications) = db.clear_notifications().await.unwrap();
    assert_eq!((read_rows, notifications), (3, 3));
    assert_eq!(db.notification_row_counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_unsubscribe_removes_every_row_for_endpoint() {
    let (db, _temp_dir) = create_test_db().await;

    for browser in ["one", "two"] {
        db.upsert_subscription(
            &new_subscription(browser, "https://push.example.com/shared"),
            ResubscribePolicy::Keep,
            Utc::now(),
        )
        .await
        .unwrap();
    }

    assert_eq!(
        db.delete_subscriptions_by_endpoint("https://push.example.com/shared")
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        db.delete_subscriptions_by_endpoint("https://push.example.com/shared")
            .await
            .unwrap(),
        0
    );
}
