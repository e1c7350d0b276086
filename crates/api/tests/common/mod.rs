#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use http_body_util::BodyExt;
use skinscan_api::auth::jwt::{generate_access_token, JwtConfig};
use skinscan_api::config::{
    BillingConfig, LogFormat, OracleConfig, ScanPolicy, ServerConfig,
};
use skinscan_api::router::build_app_router;
use skinscan_api::state::AppState;
use skinscan_core::types::UserId;
use skinscan_db::repositories::{InMemoryAchievementRepo, InMemoryEntitlementRepo};
use skinscan_oracle::OracleClient;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Smallest body that sniffs as JPEG.
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// Oracle URL nothing listens on, for tests that never reach the oracle.
pub const UNUSED_ORACLE_URL: &str = "http://127.0.0.1:9/score";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(oracle_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        log_format: LogFormat::Text,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            audience: None,
        },
        oracle: OracleConfig {
            url: oracle_url.to_string(),
            timeout_secs: 5,
        },
        billing: BillingConfig {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            allow_unsigned: false,
            signature_tolerance_secs: 300,
        },
        scans: ScanPolicy {
            free_scan_allowance: 1,
            max_image_bytes: 1024 * 1024,
        },
    }
}

/// The application under test plus handles on its in-memory stores.
pub struct TestApp {
    pub router: Router,
    pub entitlements: Arc<InMemoryEntitlementRepo>,
    pub achievements: Arc<InMemoryAchievementRepo>,
    pub config: ServerConfig,
}

impl TestApp {
    pub fn new(config: ServerConfig) -> Self {
        let entitlements = Arc::new(InMemoryEntitlementRepo::new());
        let achievements = Arc::new(InMemoryAchievementRepo::new());
        let oracle = OracleClient::new(
            config.oracle.url.clone(),
            Duration::from_secs(config.oracle.timeout_secs),
        )
        .unwrap();

        let state = AppState {
            config: Arc::new(config.clone()),
            entitlements: entitlements.clone(),
            achievements: achievements.clone(),
            oracle: Arc::new(oracle),
        };

        Self {
            router: build_app_router(state, &config),
            entitlements,
            achievements,
            config,
        }
    }

    pub fn with_oracle(oracle_url: &str) -> Self {
        Self::new(test_config(oracle_url))
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn token(&self, user: UserId, email: Option<&str>) -> String {
        generate_access_token(user, email, 3600, &self.config.jwt).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Mock oracle
// ---------------------------------------------------------------------------

/// A local oracle answering every request with `status` and `body`.
pub struct MockOracle {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

impl MockOracle {
    pub async fn spawn(status: StatusCode, body: impl Into<String>) -> Self {
        let body: String = body.into();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/score",
            post(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/score"),
            hits,
        }
    }

    /// An oracle returning a valid score report.
    pub async fn healthy() -> Self {
        Self::spawn(
            StatusCode::OK,
            r#"{"acne":8,"redness":7,"texture":9,"fineLines":6,"darkSpots":7}"#,
        )
        .await
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json_with_token(uri: &str, token: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub fn post_jpeg(uri: &str, token: Option<&str>, bytes: &[u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "image/jpeg");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(bytes.to_vec())).unwrap()
}

pub const BOUNDARY: &str = "skinscan-test-boundary";

/// Build a multipart body with one file part named `field`.
pub fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"face.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn post_multipart(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
