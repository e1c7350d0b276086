//! Analysis producers: turn a captured photo into a [`ScanResult`].

use std::time::Duration;

use async_trait::async_trait;
use skinscan_core::error::CoreError;
use skinscan_core::scan::{synthesize_scan, ScanResult};
use skinscan_core::scoring::ScoreWeights;

use crate::api_client::{ClientError, SkinScanClient};

/// Artificial latency of [`MockAnalyzer`] unless overridden.
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(2500);

/// A photo ready for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Where the photo can be shown from later, e.g. a data URI.
    pub reference: Option<String>,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The producer returned scores outside the valid range.
    #[error("Invalid analysis result: {0}")]
    Invalid(#[from] CoreError),
}

#[async_trait]
pub trait SkinAnalyzer: Send + Sync {
    /// Produce a locked scan for `image`.
    async fn analyze(&self, image: CapturedImage) -> Result<ScanResult, AnalyzeError>;
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Local producer: waits, then draws scores in the biased-good range.
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    delay: Duration,
    weights: ScoreWeights,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self {
            delay: DEFAULT_MOCK_DELAY,
            weights: ScoreWeights::default(),
        }
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }
}

#[async_trait]
impl SkinAnalyzer for MockAnalyzer {
    async fn analyze(&self, image: CapturedImage) -> Result<ScanResult, AnalyzeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scan = synthesize_scan(&mut rand::rng(), &self.weights, image.reference)?;
        tracing::debug!(scan_id = %scan.id, overall = scan.overall_score, "Mock analysis done");
        Ok(scan)
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Sends the photo through the server proxy to the scoring oracle.
#[derive(Debug, Clone)]
pub struct RemoteAnalyzer {
    client: SkinScanClient,
    weights: ScoreWeights,
}

impl RemoteAnalyzer {
    pub fn new(client: SkinScanClient) -> Self {
        Self {
            client,
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }
}

#[async_trait]
impl SkinAnalyzer for RemoteAnalyzer {
    async fn analyze(&self, image: CapturedImage) -> Result<ScanResult, AnalyzeError> {
        let report = self.client.analyze_jpeg(image.bytes).await?;
        let scan = report.into_scan(&self.weights, image.reference)?;
        tracing::info!(scan_id = %scan.id, overall = scan.overall_score, "Remote analysis done");
        Ok(scan)
    }
}
