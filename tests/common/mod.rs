//! Common test utilities for E2E tests

#![allow(dead_code)]

use questboard::{AppState, config};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A guild member as the chat front end would forward it
#[derive(Debug, Clone, Copy)]
pub struct TestActor {
    pub user_id: i64,
    pub guild_id: i64,
    pub role_names: &'static str,
    pub permissions: &'static str,
}

impl TestActor {
    pub const fn member(user_id: i64, guild_id: i64) -> Self {
        Self {
            user_id,
            guild_id,
            role_names: "",
            permissions: "",
        }
    }

    pub const fn quest_master(user_id: i64, guild_id: i64) -> Self {
        Self {
            role_names: "Quest Master",
            ..Self::member(user_id, guild_id)
        }
    }

    pub const fn admin(user_id: i64, guild_id: i64) -> Self {
        Self {
            permissions: "administrator",
            ..Self::member(user_id, guild_id)
        }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 4,
                acquire_timeout_seconds: 5,
                busy_timeout_seconds: 5,
            },
            lifecycle: config::LifecycleConfig::default(),
            scheduler: config::SchedulerConfig {
                enabled: false,
                ..config::SchedulerConfig::default()
            },
            permissions: config::PermissionsConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = questboard::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a request on behalf of a member
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        actor: TestActor,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("X-User-Id", actor.user_id.to_string())
            .header("X-Guild-Id", actor.guild_id.to_string())
            .header("X-Role-Names", actor.role_names)
            .header("X-Guild-Permissions", actor.permissions)
    }

    /// Create a quest through the API and return its ID
    pub async fn create_quest(&self, creator: TestActor, body: Value) -> String {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/quests", creator)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let quest: Value = response.json().await.unwrap();
        quest["quest_id"].as_str().unwrap().to_string()
    }
}
