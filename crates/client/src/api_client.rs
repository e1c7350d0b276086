//! HTTP client for the SkinScan server endpoints.
//!
//! Wraps `/api/v1/*` with [`reqwest`]. Every call carries the caller's
//! bearer token; error envelopes are decoded into [`ClientError`].

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skinscan_core::achievement::{Achievement, AwardAchievementRequest};
use skinscan_core::eligibility::EligibilityResponse;
use skinscan_core::entitlement::SubscriptionTier;
use skinscan_core::scan::OracleReport;
use skinscan_core::types::Timestamp;

const API_PREFIX: &str = "/api/v1";

/// Longest raw body kept in an error when the server did not send JSON.
const MAX_RAW_ERROR_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed, or a 2xx body did not decode.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// No scan allowed right now.
    #[error("{error}: {message}")]
    RateLimited {
        error: String,
        message: String,
        next_available_at: Option<Timestamp>,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-2xx answer.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
    },
}

/// Server error envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    next_available_date: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Answer of `POST /achievements`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub success: bool,
    pub achievement: Option<Achievement>,
    pub message: String,
    #[serde(default)]
    pub already_unlocked: bool,
}

/// Answer of `GET /me/entitlement`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    pub subscription_tier: SubscriptionTier,
    pub is_premium: bool,
    pub free_scans_remaining: i32,
    pub total_scans: i64,
    pub last_free_scan_at: Option<Timestamp>,
    pub next_free_scan_at: Option<Timestamp>,
    pub eligible: bool,
}

#[derive(Debug, Clone)]
pub struct SkinScanClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SkinScanClient {
    /// * `base_url` - server origin, e.g. `http://localhost:3000`.
    /// * `token` - identity provider access token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Swap the access token after the identity provider refreshed it.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    pub async fn scan_eligibility(&self) -> Result<EligibilityResponse, ClientError> {
        let response = self.get("/scan-eligibility").send().await?;
        Self::parse_response(response).await
    }

    /// Send a JPEG for scoring; the server enforces eligibility first.
    pub async fn analyze_jpeg(&self, image: Vec<u8>) -> Result<OracleReport, ClientError> {
        let response = self
            .post("/analyze")
            .header(CONTENT_TYPE, "image/jpeg")
            .body(image)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn award_achievement(
        &self,
        request: &AwardAchievementRequest,
    ) -> Result<AwardResult, ClientError> {
        let response = self.post("/achievements").json(request).send().await?;
        Self::parse_response(response).await
    }

    pub async fn list_achievements(&self) -> Result<Vec<Achievement>, ClientError> {
        let response = self.get("/achievements").send().await?;
        let envelope: DataEnvelope<Vec<Achievement>> = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    pub async fn entitlement(&self) -> Result<EntitlementSnapshot, ClientError> {
        let response = self.get("/me/entitlement").send().await?;
        let envelope: DataEnvelope<EntitlementSnapshot> = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Turn a non-2xx answer into the matching [`ClientError`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
            error: text.chars().take(MAX_RAW_ERROR_CHARS).collect(),
            message: None,
            code: None,
            details: None,
            next_available_date: None,
        });

        tracing::debug!(status = status.as_u16(), error = %body.error, "Server rejected request");

        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(body.error),
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited {
                message: body.message.unwrap_or_else(|| body.error.clone()),
                error: body.error,
                next_available_at: body.next_available_date,
                retry_after_secs,
            },
            _ => ClientError::Api {
                status: status.as_u16(),
                code: body.code,
                message: body.error,
                details: body.details,
            },
        })
    }
}
