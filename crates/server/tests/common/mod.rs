//! Common test utilities for API testing.
//!
//! Builds an in-process router over a temporary SQLite database, with the
//! announcement writer delivering into a `RecordingSink`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use frontdesk_core::{
    create_announcement_system, testing::RecordingSink, Config, DatabaseConfig, DispatchEngine,
    Locale, QueueStore, QueueView, SqliteCounterStore, SqliteQueueStore, TicketCounter,
};
use frontdesk_server::api::{create_router, WsBroadcaster};
use frontdesk_server::state::AppState;

/// In-process server for API tests.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_issue() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.post("/api/v1/tickets", json!({"class": "normal"})).await;
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<SqliteQueueStore>,
    pub view: Arc<QueueView>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Default::default()
        };

        let store =
            Arc::new(SqliteQueueStore::new(&db_path).expect("Failed to create queue store"));
        let counters =
            Arc::new(SqliteCounterStore::new(&db_path).expect("Failed to create counter store"));

        let sink = Arc::new(RecordingSink::new());
        let (handle, writer) = create_announcement_system(sink.clone(), Locale::PtBr, 64);
        tokio::spawn(writer.run());

        let engine = Arc::new(
            DispatchEngine::new(
                config.dispatch.clone(),
                store.clone() as Arc<dyn QueueStore>,
                TicketCounter::new(counters),
            )
            .with_announcements(handle),
        );
        let view = Arc::new(QueueView::new(
            store.clone() as Arc<dyn QueueStore>,
            Duration::from_secs(3600),
        ));

        let state = Arc::new(AppState::new(
            config,
            engine,
            view.clone(),
            WsBroadcaster::default(),
        ));

        Self {
            router: create_router(state),
            sink,
            store,
            view,
            temp_dir,
        }
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

    /// Issue a ticket and return its JSON.
    pub async fn issue(&self, class: &str) -> Value {
        let response = self
            .post("/api/v1/tickets", serde_json::json!({ "class": class }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }

    /// Wait until the announcement writer has delivered `n` announcements.
    pub async fn wait_for_announcements(&self, n: usize) -> Vec<String> {
        for _ in 0..100 {
            let texts: Vec<String> = self
                .sink
                .announcements()
                .into_iter()
                .map(|(text, _)| text)
                .collect();
            if texts.len() >= n {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} announcements", n);
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

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
