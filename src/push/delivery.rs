//! Notification fan-out
//!
//! Delivers one payload to many subscriptions with a concurrency limit.
//! Every delivery settles; one failure never stops the others.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use super::{PushDelivery, PushTarget};
use crate::data::Subscription;
use crate::metrics::PUSH_DELIVERIES_TOTAL;

/// How one delivery ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Push service reported the subscription gone
    Expired,
    Failed(String),
}

impl DeliveryOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Expired => "expired",
            Self::Failed(_) => "failed",
        }
    }
}

/// Delivery result for one subscription
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub subscription_id: i64,
    pub endpoint: String,
    pub outcome: DeliveryOutcome,
}

/// Aggregate counts of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub expired: usize,
}

impl DeliveryReport {
    pub fn from_results(results: &[DeliveryResult]) -> Self {
        let mut report = Self {
            attempted: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Expired => report.expired += 1,
                DeliveryOutcome::Failed(_) => report.failed += 1,
            }
        }
        report
    }
}

/// Send `payload` to every subscription
///
/// # Arguments
/// * `push` - Delivery collaborator
/// * `subscriptions` - Targets
/// * `payload` - Serialized notification body
/// * `max_concurrent` - Upper bound on in-flight deliveries
///
/// # Returns
/// One result per subscription, in no particular order
pub async fn fan_out(
    push: Arc<dyn PushDelivery>,
    subscriptions: Vec<Subscription>,
    payload: Arc<Vec<u8>>,
    max_concurrent: usize,
) -> Vec<DeliveryResult> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = Vec::with_capacity(subscriptions.len());

    for subscription in subscriptions {
        let semaphore = semaphore.clone();
        let payload = payload.clone();
        let push = push.clone();
        let subscription_id = subscription.id;
        let endpoint = subscription.endpoint.clone();
        let target = PushTarget::from(&subscription);

        let task = tokio::spawn(async move {
            // Acquire semaphore permit
            let _permit = semaphore.acquire().await.ok();

            match push.send(&target, &payload).await {
                Ok(()) => DeliveryOutcome::Delivered,
                Err(e) if e.is_expired() => DeliveryOutcome::Expired,
                Err(e) => DeliveryOutcome::Failed(e.to_string()),
            }
        });

        tasks.push((subscription_id, endpoint, task));
    }

    // Collect results
    let mut results = Vec::with_capacity(tasks.len());
    for (subscription_id, endpoint, task) in tasks {
        let outcome = task
            .await
            .unwrap_or_else(|e| DeliveryOutcome::Failed(format!("delivery task aborted: {e}")));

        PUSH_DELIVERIES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        if let DeliveryOutcome::Failed(reason) = &outcome {
            tracing::warn!(subscription_id, endpoint = %endpoint, error = %reason, "Push delivery failed");
        }

        results.push(DeliveryResult {
            subscription_id,
            endpoint,
            outcome,
        });
    }

    // Log summary
    let report = DeliveryReport::from_results(&results);
    tracing::info!(
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failed,
        expired = report.expired,
        "Push fan-out complete"
    );

    results
}
