use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use studyhub::config::ServerConfig;
use studyhub::server::{AppState, create_router};
use studyhub::store::{SqliteStore, Store};

/// An in-process server bound to an ephemeral port, backed by a throwaway database.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let mut config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            // Simulated jobs stay processing for the whole test unless configured otherwise.
            simulated_delay: Duration::from_secs(600),
            ..ServerConfig::default()
        };
        configure(&mut config);

        let store = SqliteStore::new(config.db_path()).expect("open store");
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(Arc::new(store), &config).expect("build state"));
        let app = create_router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let server = Self {
            temp_dir,
            base_url,
            state,
            client: reqwest::Client::new(),
            handle,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        for _ in 0..50 {
            if self.client.get(self.url("/health")).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, email: &str, password: &str) -> StatusCode {
        self.client
            .post(self.url("/api/auth/signup"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("signup request")
            .status()
    }

    /// Logs in on the body channel and returns the response JSON.
    pub async fn login(&self, email: &str, password: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), StatusCode::OK, "login failed");
        resp.json().await.expect("parse login response")
    }

    /// Signs up and logs in, returning `(user_id, access_token)`.
    pub async fn register(&self, email: &str) -> (String, String) {
        assert_eq!(self.signup(email, "pw1").await, StatusCode::CREATED);
        let body = self.login(email, "pw1").await;
        (
            body["user"]["id"].as_str().expect("user id").to_string(),
            body["accessToken"].as_str().expect("access token").to_string(),
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
