//! Cinedash - movie catalog admin backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Catalog and comment endpoints                            │
//! │  - Notification endpoints + SSE stream                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Validation and cache invalidation                        │
//! │  - Notification fan-out (realtime + Web Push)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Read-through cache (moka or disabled)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database and cache layer
//! - `push`: Web Push encryption, VAPID and fan-out
//! - `realtime`: In-process broadcast to connected clients
//! - `auth`: Admin token extractor
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod push;
pub mod realtime;
pub mod service;

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Application state shared across all handlers
///
/// Cloned for each request; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Read-through cache shared by the entity services
    pub cache: Arc<data::Cache>,

    /// Realtime broadcast hub
    pub hub: Arc<realtime::NotificationHub>,

    pub categories: Arc<service::CategoryService>,
    pub movies: Arc<service::MovieService>,
    pub sources: Arc<service::SourceService>,
    pub comments: Arc<service::CommentService>,
    pub notifications: Arc<service::NotificationService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Initialize cache backend
    /// 3. Build Web Push client if enabled
    /// 4. Wire services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        // 2. Initialize cache
        let cache = data::Cache::from_config(&config.cache);
        tracing::info!(
            backend = cache.backend_name(),
            default_ttl_seconds = config.cache.default_ttl_seconds,
            "Cache initialized"
        );

        // 3. Web Push
        let push = build_push_client(&config.push)?;

        let state = Self::from_parts(
            config,
            Arc::new(db),
            Arc::new(cache),
            push,
        );
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Wire services over already constructed collaborators
    pub fn from_parts(
        config: config::AppConfig,
        db: Arc<data::Database>,
        cache: Arc<data::Cache>,
        push: Option<Arc<dyn push::PushDelivery>>,
    ) -> Self {
        let hub = Arc::new(realtime::NotificationHub::new());

        let categories = service::CategoryService::new(db.clone(), cache.clone());
        let movies = service::MovieService::new(db.clone(), cache.clone());
        let sources = service::SourceService::new(db.clone(), cache.clone());
        let comments = service::CommentService::new(db.clone(), cache.clone());
        let notifications = service::NotificationService::new(
            db.clone(),
            hub.clone(),
            push,
            config.notifications.clone(),
        );

        Self {
            config: Arc::new(config),
            db,
            cache,
            hub,
            categories: Arc::new(categories),
            movies: Arc::new(movies),
            sources: Arc::new(sources),
            comments: Arc::new(comments),
            notifications: Arc::new(notifications),
        }
    }

    /// Release the cache backend and the connection pool
    pub async fn shutdown(&self) {
        self.cache.close().await;
        self.db.close().await;
        tracing::info!("Application state shut down");
    }
}

fn build_push_client(
    config: &config::PushConfig,
) -> Result<Option<Arc<dyn push::PushDelivery>>, error::AppError> {
    if !config.enabled {
        tracing::info!("Web Push disabled");
        return Ok(None);
    }

    let private_key = config.vapid_private_key.as_deref().ok_or_else(|| {
        error::AppError::Config("push.vapid_private_key is required when push is enabled".to_string())
    })?;
    let signer = push::VapidSigner::from_base64(private_key, config.subject.clone())
        .map_err(|e| error::AppError::Config(e.to_string()))?;

    if let Some(configured) = config.vapid_public_key.as_deref() {
        if configured.trim_end_matches('=') != signer.public_key() {
            tracing::warn!("push.vapid_public_key does not match the private key; using the derived key");
        }
    }

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("Cinedash/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| error::AppError::Internal(e.into()))?;

    let client = push::WebPushClient::new(Arc::new(http_client), signer, config.ttl_seconds);
    tracing::info!(public_key = client.public_key(), "Web Push enabled");
    Ok(Some(Arc::new(client)))
}

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the Axum router with all routes.
///
/// Shared by the binary and integration tests.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware, routing::get};
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/cache", get(cache_health))
        .nest("/api", api::api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(api::track_http_metrics))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
    }
}

/// GET /health/cache
async fn cache_health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.cache.health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "backend": state.cache.backend_name(),
            "healthy": healthy,
            "supportsPrefixDelete": state.cache.capabilities().supports_prefix_delete,
        })),
    )
}
