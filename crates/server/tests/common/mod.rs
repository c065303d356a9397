//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock providers and a mock show source injected, so the webhook and
//! sweep paths can be driven without Sonarr or any theme service.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use showtunes_core::{
    config::default_quotas,
    testing::{MockProvider, MockShowSource},
    AssetProvider, Config, DedupStore, FsSnapshotStorage, OrchestratorConfig, Schedulers,
    ShowSource, SnapshotStorage, Sweeper, ThemeOrchestrator, DEFAULT_FLUSH_INTERVAL,
};
use showtunes_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use showtunes_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_webhook() {
///     let fixture = TestFixture::new();
///     let response = fixture.post("/api/v1/webhook/sonarr", json!({"eventType": "Test"})).await;
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Theme audio provider, tried first
    pub plex: Arc<MockProvider>,
    /// Theme video provider, tried second
    pub anime: Arc<MockProvider>,
    /// Show source behind the sweeper (if enabled)
    pub source: Option<Arc<MockShowSource>>,
    pub orchestrator: Arc<ThemeOrchestrator>,
    pub sweeper: Option<Arc<Sweeper>>,
    /// Library root containing show folders
    pub library: PathBuf,
    /// Temporary directory holding the library and the store
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture without a show source.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Create a fixture with a mock show source and sweeper.
    pub fn with_source() -> Self {
        Self::build(true)
    }

    fn build(with_source: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let library = temp_dir.path().join("tv");
        std::fs::create_dir(&library).expect("Failed to create library");

        let mut config = Config::default();
        config.storage.dir = temp_dir.path().join("db");

        let schedulers =
            Schedulers::from_quotas(default_quotas().iter()).expect("Failed to build schedulers");
        let storage: Arc<dyn SnapshotStorage> =
            Arc::new(FsSnapshotStorage::new(&config.storage.dir));
        let dedup = DedupStore::new("theme-songs", storage, DEFAULT_FLUSH_INTERVAL);

        let plex = Arc::new(MockProvider::new("plex", true));
        let anime = Arc::new(MockProvider::new("animethemes", false));
        let providers: Vec<Arc<dyn AssetProvider>> = vec![
            Arc::clone(&plex) as Arc<dyn AssetProvider>,
            Arc::clone(&anime) as Arc<dyn AssetProvider>,
        ];
        let orchestrator = Arc::new(ThemeOrchestrator::new(
            OrchestratorConfig::default(),
            providers,
            dedup,
        ));

        let (source, sweeper) = if with_source {
            let source = Arc::new(MockShowSource::new());
            let sweeper = Arc::new(Sweeper::new(
                Arc::clone(&source) as Arc<dyn ShowSource>,
                Arc::clone(&orchestrator),
                Duration::from_secs(30 * 60),
            ));
            (Some(source), Some(sweeper))
        } else {
            (None, None)
        };

        let state = Arc::new(AppState::new(
            config,
            schedulers,
            Arc::clone(&orchestrator),
            sweeper.clone(),
        ));

        Self {
            router: create_router(state),
            plex,
            anime,
            source,
            orchestrator,
            sweeper,
            library,
            temp_dir,
        }
    }

    /// Create a show folder in the library and return its path.
    pub fn show_dir(&self, title: &str) -> PathBuf {
        let path = self.library.join(title);
        std::fs::create_dir_all(&path).expect("Failed to create show dir");
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a path and return the raw body text (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Poll until `path` exists or the timeout elapses.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    path.exists()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
