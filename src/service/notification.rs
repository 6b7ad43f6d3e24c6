//! Notification service
//!
//! Handles browser subscriptions, broadcast of new notifications
//! (realtime + Web Push) and per-browser read state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use super::require_text;
use crate::config::NotificationConfig;
use crate::data::{
    Database, NewSubscription, Notification, NotificationPayload, NotificationWithState,
    Subscription,
};
use crate::error::AppError;
use crate::push::{DeliveryOutcome, DeliveryReport, PushDelivery, fan_out};
use crate::realtime::Publisher;

/// Result of a subscribe call
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeOutcome {
    pub subscription: Subscription,
    /// false when the browser id was already registered
    pub created: bool,
}

/// Result of a send call
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub notification: Notification,
    pub delivery: DeliveryReport,
}

/// Notification service
pub struct NotificationService {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
    push: Option<Arc<dyn PushDelivery>>,
    settings: NotificationConfig,
}

impl NotificationService {
    /// Create new notification service
    ///
    /// # Arguments
    /// * `push` - Web Push collaborator; `None` skips push fan-out
    pub fn new(
        db: Arc<Database>,
        publisher: Arc<dyn Publisher>,
        push: Option<Arc<dyn PushDelivery>>,
        settings: NotificationConfig,
    ) -> Self {
        Self {
            db,
            publisher,
            push,
            settings,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a browser for push notifications
    ///
    /// One row per browser id. What a repeated subscribe does is decided by
    /// the configured resubscribe policy.
    pub async fn subscribe(
        &self,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
        browser_id: &str,
    ) -> Result<SubscribeOutcome, AppError> {
        let mut missing = Vec::new();
        for (field, value) in [
            ("endpoint", endpoint),
            ("keys.p256dh", p256dh),
            ("keys.auth", auth),
            ("browserId", browser_id),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        url::Url::parse(endpoint.trim())
            .map_err(|_| AppError::Validation("endpoint must be an absolute URL".to_string()))?;

        let subscription = NewSubscription {
            endpoint: endpoint.trim().to_string(),
            p256dh_key: p256dh.trim().to_string(),
            auth_key: auth.trim().to_string(),
            browser_id: browser_id.trim().to_string(),
        };
        let (subscription, created) = self
            .db
            .upsert_subscription(&subscription, self.settings.resubscribe_policy, Utc::now())
            .await?;

        tracing::info!(
            subscription_id = subscription.id,
            created,
            policy = ?self.settings.resubscribe_policy,
            "Subscription registered"
        );
        Ok(SubscribeOutcome {
            subscription,
            created,
        })
    }

    /// Remove every subscription using `endpoint`
    ///
    /// # Returns
    /// Number of removed subscriptions
    pub async fn unsubscribe(&self, endpoint: &str) -> Result<u64, AppError> {
        let endpoint = require_text("endpoint", endpoint)?;
        let removed = self.db.delete_subscriptions_by_endpoint(&endpoint).await?;

        tracing::info!(removed, "Subscriptions removed");
        Ok(removed)
    }

    // =========================================================================
    // Broadcast
    // =========================================================================

    /// Persist a notification and broadcast it
    ///
    /// # Side Effects
    /// - Emits the payload to realtime listeners
    /// - Pushes to every subscription active within the configured window,
    ///   pruning those the push service reports as expired
    pub async fn send(
        &self,
        title: &str,
        message: &str,
        url: Option<&str>,
    ) -> Result<SendOutcome, AppError> {
        let title = require_text("title", title)?;
        let message = require_text("message", message)?;
        let url = url.map(str::trim).filter(|u| !u.is_empty());

        // 1. Persist
        let notification = self
            .db
            .insert_notification(&title, &message, url, Utc::now())
            .await?;
        let payload = NotificationPayload::from_notification(&notification, &self.settings.default_url);

        // 2. Realtime
        let listeners = self.publisher.emit(&payload, None);
        tracing::info!(notification_id = notification.id, listeners, "Notification created");

        // 3. Push fan-out
        let Some(push) = &self.push else {
            tracing::debug!("Push delivery disabled; skipping fan-out");
            return Ok(SendOutcome {
                notification,
                delivery: DeliveryReport::default(),
            });
        };

        let since = Utc::now() - Duration::days(self.settings.active_window_days);
        let subscriptions = self.db.list_active_subscriptions(since).await?;
        let body = serde_json::to_vec(&payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode payload: {e}")))?;

        let results = fan_out(
            push.clone(),
            subscriptions,
            Arc::new(body),
            self.settings.delivery_concurrency,
        )
        .await;

        for result in &results {
            if result.outcome != DeliveryOutcome::Expired {
                continue;
            }
            match self.db.delete_subscription(result.subscription_id).await {
                Ok(_) => tracing::info!(
                    subscription_id = result.subscription_id,
                    "Pruned expired subscription"
                ),
                Err(e) => tracing::warn!(
                    subscription_id = result.subscription_id,
                    error = %e,
                    "Failed to prune expired subscription"
                ),
            }
        }

        Ok(SendOutcome {
            notification,
            delivery: DeliveryReport::from_results(&results),
        })
    }

    // =========================================================================
    // Read state
    // =========================================================================

    /// Mark a notification read for one browser
    ///
    /// # Returns
    /// true if this call created the read record
    pub async fn mark_read(&self, notification_id: i64, browser_id: &str) -> Result<bool, AppError> {
        let browser_id = require_text("browserId", browser_id)?;
        let subscription = self
            .db
            .get_subscription_by_browser_id(&browser_id)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;
        if self.db.get_notification(notification_id).await?.is_none() {
            return Err(AppError::NotFound("notification"));
        }

        self.db
            .mark_notification_read(subscription.id, notification_id, Utc::now())
            .await
    }

    /// Delete every notification and every read record
    pub async fn clear(&self) -> Result<(), AppError> {
        let (read_rows, notifications) = self.db.clear_notifications().await?;
        tracing::info!(read_rows, notifications, "Notifications cleared");
        Ok(())
    }

    /// Most recent notifications with read state for `browser_id`
    ///
    /// Unknown or absent browsers see everything as unread.
    pub async fn list(
        &self,
        browser_id: Option<&str>,
    ) -> Result<Vec<NotificationWithState>, AppError> {
        let subscription_id = match browser_id.map(str::trim).filter(|b| !b.is_empty()) {
            Some(browser_id) => self
                .db
                .get_subscription_by_browser_id(browser_id)
                .await?
                .map(|s| s.id),
            None => None,
        };

        self.db
            .list_notifications_with_state(subscription_id, self.settings.list_limit)
            .await
    }

    /// Number of listed notifications `browser_id` has not read
    pub async fn unread_count(&self, browser_id: Option<&str>) -> Result<usize, AppError> {
        let notifications = self.list(browser_id).await?;
        Ok(notifications.iter().filter(|n| !n.is_read).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResubscribePolicy;
    use crate::push::{MockPushDelivery, PushError};
    use crate::realtime::NotificationHub;
    use tempfile::TempDir;

    fn settings() -> NotificationConfig {
        NotificationConfig {
            resubscribe_policy: ResubscribePolicy::Keep,
            active_window_days: 90,
            list_limit: 20,
            default_url: "/movies".to_string(),
            delivery_concurrency: 3,
        }
    }

    async fn create_service(
        push: Option<Arc<dyn PushDelivery>>,
    ) -> (NotificationService, Arc<Database>, Arc<NotificationHub>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::connect(&temp_dir.path().join("test.db")).await.unwrap());
        let hub = Arc::new(NotificationHub::new());
        let service = NotificationService::new(db.clone(), hub.clone(), push, settings());
        (service, db, hub, temp_dir)
    }

    async fn subscribe(service: &NotificationService, n: usize) {
        for i in 0..n {
            service
                .subscribe(
                    &format!("https://push.example.com/{i}"),
                    "p256dh",
                    "auth",
                    &format!("browser-{i}"),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn subscribe_reports_missing_fields() {
        let (service, _db, _hub, _temp_dir) = create_service(None).await;

        let error = service
            .subscribe("https://push.example.com/a", "", "auth", " ")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::Validation(message) if message.contains("keys.p256dh") && message.contains("browserId")
        ));
    }

    #[tokio::test]
    async fn second_subscribe_is_a_noop_under_keep_policy() {
        let (service, _db, _hub, _temp_dir) = create_service(None).await;

        let first = service
            .subscribe("https://push.example.com/a", "k1", "a1", "browser")
            .await
            .unwrap();
        let second = service
            .subscribe("https://push.example.com/b", "k2", "a2", "browser")
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.subscription.endpoint, "https://push.example.com/a");
    }

    #[tokio::test]
    async fn send_attempts_every_subscription_and_prunes_expired() {
        let mut push = MockPushDelivery::new();
        push.expect_send().times(5).returning(|target, _| {
            match target.endpoint.as_str() {
                "https://push.example.com/1" => Err(PushError::Rejected(500)),
                "https://push.example.com/3" => Err(PushError::Expired(410)),
                _ => Ok(()),
            }
        });
        let (service, db, _hub, _temp_dir) = create_service(Some(Arc::new(push))).await;
        subscribe(&service, 5).await;

        let outcome = service.send("New movie", "Heat is out", None).await.unwrap();

        assert_eq!(
            outcome.delivery,
            DeliveryReport {
                attempted: 5,
                delivered: 3,
                failed: 1,
                expired: 1,
            }
        );
        assert!(db.get_subscription_by_browser_id("browser-3").await.unwrap().is_none());
        assert!(db.get_subscription_by_browser_id("browser-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn send_emits_realtime_payload_with_default_url() {
        let (service, _db, hub, _temp_dir) = create_service(None).await;
        let mut listener = hub.listen(None);

        let outcome = service.send("New movie", "Heat is out", None).await.unwrap();
        assert_eq!(outcome.delivery, DeliveryReport::default());

        let payload = listener.recv().await.unwrap();
        assert_eq!(payload.id, outcome.notification.id);
        assert_eq!(payload.url, "/movies");
        assert_eq!(payload.title, "New movie");
    }

    #[tokio::test]
    async fn send_requires_title_and_message() {
        let (service, db, _hub, _temp_dir) = create_service(None).await;

        assert!(matches!(
            service.send("", "body", None).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(db.notification_row_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn read_state_is_isolated_per_browser() {
        let (service, _db, _hub, _temp_dir) = create_service(None).await;
        subscribe(&service, 2).await;
        let sent = service.send("Title", "Body", Some("/movies/1")).await.unwrap();

        assert!(service.mark_read(sent.notification.id, "browser-0").await.unwrap());
        assert!(!service.mark_read(sent.notification.id, "browser-0").await.unwrap());

        let reader = service.list(Some("browser-0")).await.unwrap();
        let other = service.list(Some("browser-1")).await.unwrap();
        assert!(reader[0].is_read);
        assert!(!other[0].is_read);
        assert_eq!(service.unread_count(Some("browser-0")).await.unwrap(), 0);
        assert_eq!(service.unread_count(Some("browser-1")).await.unwrap(), 1);
        assert_eq!(service.unread_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_read_requires_known_subscription_and_notification() {
        let (service, _db, _hub, _temp_dir) = create_service(None).await;
        subscribe(&service, 1).await;
        let sent = service.send("Title", "Body", None).await.unwrap();

        assert!(matches!(
            service.mark_read(sent.notification.id, "stranger").await,
            Err(AppError::NotFound("subscription"))
        ));
        assert!(matches!(
            service.mark_read(9999, "browser-0").await,
            Err(AppError::NotFound("notification"))
        ));
    }

    #[tokio::test]
    async fn clear_removes_notifications_and_read_state() {
        let (service, db, _hub, _temp_dir) = create_service(None).await;
        subscribe(&service, 1).await;
        for i in 0..3 {
            let sent = service.send(&format!("T{i}"), "Body", None).await.unwrap();
            service.mark_read(sent.notification.id, "browser-0").await.unwrap();
        }

        service.clear().await.unwrap();

        assert!(service.list(Some("browser-0")).await.unwrap().is_empty());
        assert_eq!(db.notification_row_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn list_is_limited_and_newest_first() {
        let (service, _db, _hub, _temp_dir) = create_service(None).await;
        for i in 0..25 {
            service.send(&format!("T{i}"), "Body", None).await.unwrap();
        }

        let listed = service.list(None).await.unwrap();
        assert_eq!(listed.len(), 20);
        assert_eq!(listed[0].title, "T24");
    }
}
