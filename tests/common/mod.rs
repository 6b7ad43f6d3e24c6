//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cinedash::data::{Cache, Database, MemoryBackend};
use cinedash::push::{PushDelivery, PushError, PushTarget};
use cinedash::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Push collaborator that records deliveries instead of calling a push service
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<(String, Value)>>,
    expired: HashSet<String>,
}

impl RecordingPush {
    /// Endpoints in `expired` answer as a push service would for a gone subscription
    pub fn with_expired(expired: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            expired: expired.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect();
        endpoints.sort();
        endpoints
    }
}

#[async_trait]
impl PushDelivery for RecordingPush {
    async fn send(&self, target: &PushTarget, payload: &[u8]) -> Result<(), PushError> {
        if self.expired.contains(&target.endpoint) {
            return Err(PushError::Expired(410));
        }
        let body: Value = serde_json::from_slice(payload).unwrap();
        self.sent
            .lock()
            .unwrap()
            .push((target.endpoint.clone(), body));
        Ok(())
    }
}

pub fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "development".to_string(),
            allowed_origins: Vec::new(),
        },
        database: config::DatabaseConfig { path: db_path },
        cache: config::CacheConfig {
            backend: config::CacheBackendKind::Memory,
            default_ttl_seconds: 259_200,
            max_capacity: 10_000,
        },
        notifications: config::NotificationConfig {
            resubscribe_policy: config::ResubscribePolicy::Keep,
            active_window_days: 90,
            list_limit: 20,
            default_url: "/movies".to_string(),
            delivery_concurrency: 4,
        },
        push: config::PushConfig {
            enabled: false,
            vapid_public_key: None,
            vapid_private_key: None,
            subject: "mailto:admin@example.com".to_string(),
            ttl_seconds: 86_400,
        },
        auth: config::AuthConfig {
            admin_token: Some(ADMIN_TOKEN.to_string()),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub push: Arc<RecordingPush>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_push(RecordingPush::default()).await
    }

    /// Create a test server whose push fan-out goes to `push`
    pub async fn with_push(push: RecordingPush) -> Self {
        cinedash::metrics::init_metrics();

        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path().join("test.db"));

        let db = Database::connect(&config.database.path).await.unwrap();
        let cache = Cache::new(
            Arc::new(MemoryBackend::new(config.cache.max_capacity)),
            config.cache.default_ttl(),
        );
        let push = Arc::new(push);
        let state = AppState::from_parts(
            config,
            Arc::new(db),
            Arc::new(cache),
            Some(push.clone() as Arc<dyn PushDelivery>),
        );

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = cinedash::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            push,
            _temp_dir: temp_dir,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 200, "GET {path}");
        response.json().await.unwrap()
    }

    pub async fn create_category(&self, name: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/api/categories"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
    }

    pub async fn create_movie(&self, category_id: i64, title: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/api/movies"))
            .json(&json!({
                "title": title,
                "categoryId": category_id,
                "type": "Feature",
                "year": 1999,
                "rating": 8.5,
                "description": format!("{title} description"),
                "poster": "https://img.example.com/p.jpg",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
    }

    pub async fn create_comment(&self, movie_id: i64, text: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/api/comments"))
            .json(&json!({ "userName": "ana", "comment": text, "movieId": movie_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
    }

    pub async fn subscribe(&self, browser_id: &str, endpoint: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/notifications/subscribe"))
            .json(&json!({
                "endpoint": endpoint,
                "keys": { "p256dh": "BPk-test-key", "auth": "auth-secret" },
                "browserId": browser_id,
            }))
            .send()
            .await
            .unwrap()
    }
}
