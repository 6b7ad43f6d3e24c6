//! Web Push delivery
//!
//! - `webpush`: message encryption, VAPID signing and the HTTP client
//! - `delivery`: bounded-concurrency fan-out to many subscriptions

mod delivery;
mod webpush;

pub use delivery::{DeliveryOutcome, DeliveryReport, DeliveryResult, fan_out};
pub use webpush::{VapidSigner, WebPushClient, encrypt_payload};

use async_trait::async_trait;
use thiserror::Error;

use crate::data::Subscription;

/// Where and how to encrypt one push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub endpoint: String,
    /// Base64url uncompressed P-256 public key of the browser
    pub p256dh: String,
    /// Base64url 16-byte auth secret of the browser
    pub auth: String,
}

impl From<&Subscription> for PushTarget {
    fn from(subscription: &Subscription) -> Self {
        Self {
            endpoint: subscription.endpoint.clone(),
            p256dh: subscription.p256dh_key.clone(),
            auth: subscription.auth_key.clone(),
        }
    }
}

/// Push delivery failure
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service no longer knows this subscription (404/410)
    #[error("subscription expired (HTTP {0})")]
    Expired(u16),

    #[error("push service rejected message: HTTP {0}")]
    Rejected(u16),

    #[error("push transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("payload encryption failed: {0}")]
    Encryption(String),

    #[error("VAPID signing failed: {0}")]
    Vapid(String),
}

impl PushError {
    pub fn is_expired(&self) -> bool {
        matches!(self, PushError::Expired(_))
    }
}

/// Sends one encrypted message to one browser subscription
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send(&self, target: &PushTarget, payload: &[u8]) -> Result<(), PushError>;
}
