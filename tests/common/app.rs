//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use pagesnap::models::AppConfig;
use pagesnap::server::{build_router, create_app_state_with_launcher, AppState};

use super::fake_engine::{EngineStats, FakeBehavior, FakeEngine};

/// Scratch directories backing one test app
pub struct TestDirs {
    pub fonts: TempDir,
    pub cache: TempDir,
    pub fallback: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            fonts: tempfile::tempdir().expect("fonts dir"),
            cache: tempfile::tempdir().expect("cache dir"),
            fallback: tempfile::tempdir().expect("fallback dir"),
        }
    }

    /// Configuration pointing at these directories, without settle delays
    pub fn config(&self) -> AppConfig {
        AppConfig {
            fonts_dir: self.fonts.path().to_path_buf(),
            cache_dir: self.cache.path().join("images"),
            fallback_cache_dir: self.fallback.path().join("images"),
            settle_delay_ms: 0,
            fonts_ready_timeout_ms: 100,
            load_timeout_secs: 2,
            fetch_timeout_secs: 5,
            ..AppConfig::default()
        }
    }

    pub fn add_font(&self, file_name: &str, bytes: &[u8]) {
        std::fs::write(self.fonts.path().join(file_name), bytes).expect("write font");
    }
}

impl Default for TestDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Test application with router and direct access to the fake engine
pub struct TestApp {
    router: axum::Router,
    pub state: AppState,
    pub engine: Arc<EngineStats>,
    pub dirs: TestDirs,
}

impl TestApp {
    /// Create a new test application with a well-behaved fake engine
    pub fn new() -> Self {
        Self::with_behavior(FakeBehavior::default())
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        Self::build(TestDirs::new(), behavior)
    }

    /// Create a test app whose fonts directory holds `fonts`
    pub fn with_fonts(fonts: &[(&str, &[u8])]) -> Self {
        let dirs = TestDirs::new();
        for (name, bytes) in fonts {
            dirs.add_font(name, bytes);
        }
        Self::build(dirs, FakeBehavior::default())
    }

    fn build(dirs: TestDirs, behavior: FakeBehavior) -> Self {
        let engine = Arc::new(FakeEngine::new(behavior));
        let stats = engine.stats.clone();

        let state = create_app_state_with_launcher(&dirs.config(), engine)
            .expect("Failed to create app state");

        // Build router using shared server module (same as production)
        let router = build_router(state.clone());

        Self {
            router,
            state,
            engine: stats,
            dirs,
        }
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// POST a layout to /api/generate
    pub async fn generate(&self, layout: serde_json::Value) -> TestResponse {
        self.post_json("/api/generate", &layout.to_string()).await
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get a header value as string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Check if response is a PNG image
    pub fn is_png(&self) -> bool {
        self.body.len() >= 8 && &self.body[0..8] == b"\x89PNG\r\n\x1a\n"
    }
}
