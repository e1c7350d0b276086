//! HTTP client for the external scoring oracle.
//!
//! The oracle takes a raw JPEG body and answers with a JSON object of
//! per-metric scores. This client forwards the bytes once (no retries)
//! and hands the parsed JSON back untouched; turning it into a scan is
//! the caller's business.

use std::time::Duration;

/// Longest slice of an oracle body echoed back in errors and logs.
pub const MAX_DETAIL_CHARS: usize = 200;

/// Content type the oracle expects for the image body.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Errors from a single oracle call.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The HTTP request itself failed (connect, DNS, TLS, timeout).
    #[error("Oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The oracle answered with a non-2xx status.
    #[error("Scoring oracle failed with status {status}")]
    Status {
        status: u16,
        /// Body truncated to [`MAX_DETAIL_CHARS`].
        body: String,
    },

    /// The oracle answered 2xx with a body that is not JSON.
    #[error("Scoring oracle returned invalid JSON")]
    InvalidJson {
        /// Body truncated to [`MAX_DETAIL_CHARS`].
        body: String,
    },
}

impl OracleError {
    /// Status to surface to our own caller: the oracle's status for
    /// non-2xx answers, otherwise `None` (an internal failure).
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            OracleError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Truncated body text, when the oracle sent one.
    pub fn details(&self) -> Option<&str> {
        match self {
            OracleError::Status { body, .. } | OracleError::InvalidJson { body } => Some(body),
            OracleError::Request(_) => None,
        }
    }
}

/// Client for one oracle endpoint.
pub struct OracleClient {
    client: reqwest::Client,
    url: String,
}

impl OracleClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Forward `image` and return the oracle's JSON verbatim.
    pub async fn score(&self, image: Vec<u8>) -> Result<serde_json::Value, OracleError> {
        let size = image.len();
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, IMAGE_CONTENT_TYPE)
            .body(image)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), bytes = size, "Oracle responded");

        let text = response.text().await?;
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_DETAIL_CHARS),
            });
        }

        serde_json::from_str(&text).map_err(|_| OracleError::InvalidJson {
            body: truncate(&text, MAX_DETAIL_CHARS),
        })
    }
}

/// First `max` characters of `text`.
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("abc", 200), "abc");
        assert_eq!(truncate(&"x".repeat(300), 200).len(), 200);
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[test]
    fn error_accessors() {
        let status = OracleError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(status.upstream_status(), Some(502));
        assert_eq!(status.details(), Some("bad gateway"));
        assert_eq!(status.to_string(), "Scoring oracle failed with status 502");

        let invalid = OracleError::InvalidJson { body: "<html>".into() };
        assert_eq!(invalid.upstream_status(), None);
        assert_eq!(invalid.details(), Some("<html>"));
    }
}
