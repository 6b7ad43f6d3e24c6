//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub notifications: NotificationConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// "development" or "production"
    pub environment: String,
    /// CORS allow-list. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Cache backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process moka cache
    #[default]
    Memory,
    /// Caching disabled
    None,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    /// Default entry lifetime in seconds (default: 259200 = 3 days)
    pub default_ttl_seconds: u64,
    /// Maximum number of cached entries
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

/// What a second subscribe with a known browser id does
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResubscribePolicy {
    /// Leave the stored subscription untouched
    #[default]
    Keep,
    /// Overwrite endpoint and keys, bump updated_at
    Refresh,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub resubscribe_policy: ResubscribePolicy,
    /// Subscriptions untouched for longer are skipped during fan-out
    pub active_window_days: i64,
    /// Number of notifications returned by list
    pub list_limit: i64,
    /// URL used in the realtime payload when a notification has none
    pub default_url: String,
    /// Maximum concurrent push deliveries per send
    pub delivery_concurrency: usize,
}

/// Web Push configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    pub enabled: bool,
    /// Base64url uncompressed P-256 public key. Derived from the private key when absent.
    pub vapid_public_key: Option<String>,
    /// Base64url 32-byte P-256 private scalar
    pub vapid_private_key: Option<String>,
    /// Contact URI sent as the VAPID `sub` claim (mailto: or https:)
    pub subject: String,
    /// How long push services keep undelivered messages
    pub ttl_seconds: u32,
}

/// Admin endpoint protection
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Static bearer token for send/clear. Unset disables the check.
    pub admin_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CINEDASH__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.environment", "development")?
            .set_default("database.path", "data/cinedash.db")?
            .set_default("cache.backend", "memory")?
            .set_default("cache.default_ttl_seconds", 259_200)?
            .set_default("cache.max_capacity", 10_000)?
            .set_default("notifications.resubscribe_policy", "keep")?
            .set_default("notifications.active_window_days", 90)?
            .set_default("notifications.list_limit", 20)?
            .set_default("notifications.default_url", "/movies")?
            .set_default("notifications.delivery_concurrency", 10)?
            .set_default("push.enabled", false)?
            .set_default("push.subject", "mailto:admin@example.com")?
            .set_default("push.ttl_seconds", 86_400)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (CINEDASH__*)
            .add_source(
                Environment::with_prefix("CINEDASH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.cache.default_ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.default_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.notifications.list_limit <= 0 {
            return Err(AppError::Config(
                "notifications.list_limit must be greater than 0".to_string(),
            ));
        }

        if self.notifications.active_window_days <= 0 {
            return Err(AppError::Config(
                "notifications.active_window_days must be greater than 0".to_string(),
            ));
        }

        if self.notifications.delivery_concurrency == 0 {
            return Err(AppError::Config(
                "notifications.delivery_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.push.enabled && self.push.vapid_private_key.is_none() {
            return Err(AppError::Config(
                "push.vapid_private_key is required when push.enabled is true".to_string(),
            ));
        }

        if self.push.enabled
            && !(self.push.subject.starts_with("mailto:") || self.push.subject.starts_with("https:"))
        {
            return Err(AppError::Config(
                "push.subject must be a mailto: or https: URI".to_string(),
            ));
        }

        match &self.auth.admin_token {
            Some(token) if token.trim().is_empty() => {
                return Err(AppError::Config(
                    "auth.admin_token must not be empty when set".to_string(),
                ));
            }
            None if self.server.is_production() => {
                return Err(AppError::Config(
                    "auth.admin_token is required in production".to_string(),
                ));
            }
            None | Some(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: "development".to_string(),
                allowed_origins: Vec::new(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/cinedash-test.db"),
            },
            cache: CacheConfig {
                backend: CacheBackendKind::Memory,
                default_ttl_seconds: 259_200,
                max_capacity: 10_000,
            },
            notifications: NotificationConfig {
                resubscribe_policy: ResubscribePolicy::Keep,
                active_window_days: 90,
                list_limit: 20,
                default_url: "/movies".to_string(),
                delivery_concurrency: 10,
            },
            push: PushConfig {
                enabled: false,
                vapid_public_key: None,
                vapid_private_key: None,
                subject: "mailto:admin@example.com".to_string(),
                ttl_seconds: 86_400,
            },
            auth: AuthConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_development_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(3 * 24 * 60 * 60));
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let mut config = valid_config();
        config.cache.default_ttl_seconds = 0;

        let error = config.validate().expect_err("zero TTL must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("cache.default_ttl_seconds")
        ));
    }

    #[test]
    fn validate_rejects_push_without_vapid_key() {
        let mut config = valid_config();
        config.push.enabled = true;

        let error = config
            .validate()
            .expect_err("push without a private key must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("push.vapid_private_key")
        ));
    }

    #[test]
    fn validate_requires_admin_token_in_production() {
        let mut config = valid_config();
        config.server.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.auth.admin_token = Some("s3cret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn resubscribe_policy_parses_lowercase() {
        let policy: ResubscribePolicy =
            serde_json::from_str("\"refresh\"").expect("policy should parse");
        assert_eq!(policy, ResubscribePolicy::Refresh);
        assert_eq!(ResubscribePolicy::default(), ResubscribePolicy::Keep);
    }
}
