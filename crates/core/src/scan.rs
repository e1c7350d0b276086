//! The scan record and the two ways of producing one.
//!
//! A [`ScanResult`] is built from five metric scores by
//! [`ScanResult::from_scores`]; the derived fields (overall score,
//! severities, strength and focus) are computed exactly once there and
//! never recomputed. Scores come either from [`synthetic_scores`] (the
//! local mock producer) or from an [`OracleReport`] returned by the
//! external scoring oracle.

use std::ops::RangeInclusive;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::scoring::{
    strength_and_focus, validate_metric_score, MetricKind, ScoreWeights, Severity, METRIC_COUNT,
};
use crate::types::Timestamp;

/// Range the mock producer draws per-metric scores from (biased good).
pub const SYNTHETIC_SCORE_RANGE: RangeInclusive<u8> = 7..=9;

/// Prefix of generated scan identifiers.
pub const SCAN_ID_PREFIX: &str = "scan_";

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Score, severity band and description for one axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricScore {
    pub score: u8,
    pub severity: Severity,
    pub description: String,
}

impl MetricScore {
    pub fn new(kind: MetricKind, score: u8) -> Self {
        Self {
            score,
            severity: Severity::from_score(score),
            description: kind.description().to_string(),
        }
    }
}

/// The fixed set of five metrics, keyed by axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetrics {
    pub acne: MetricScore,
    pub redness: MetricScore,
    pub texture: MetricScore,
    pub fine_lines: MetricScore,
    pub dark_spots: MetricScore,
}

impl ScanMetrics {
    pub fn get(&self, kind: MetricKind) -> &MetricScore {
        match kind {
            MetricKind::Acne => &self.acne,
            MetricKind::Redness => &self.redness,
            MetricKind::Texture => &self.texture,
            MetricKind::FineLines => &self.fine_lines,
            MetricKind::DarkSpots => &self.dark_spots,
        }
    }

    /// Axes with their metrics in fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &MetricScore)> + '_ {
        MetricKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    /// Raw scores in fixed order.
    pub fn scores(&self) -> [u8; METRIC_COUNT] {
        MetricKind::ALL.map(|kind| self.get(kind).score)
    }
}

// ---------------------------------------------------------------------------
// ScanResult
// ---------------------------------------------------------------------------

/// One completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: String,
    pub created_at: Timestamp,
    pub overall_score: u8,
    pub metrics: ScanMetrics,
    pub strength_metric: MetricKind,
    pub focus_metric: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    #[serde(default)]
    pub unlocked: bool,
}

impl ScanResult {
    /// Build a locked scan from five scores given in [`MetricKind::ALL`] order.
    pub fn from_scores(
        scores: [u8; METRIC_COUNT],
        weights: &ScoreWeights,
        image_reference: Option<String>,
        created_at: Timestamp,
    ) -> Result<Self, CoreError> {
        for (kind, &score) in MetricKind::ALL.iter().zip(&scores) {
            validate_metric_score(*kind, score)?;
        }

        let metric = |kind: MetricKind| MetricScore::new(kind, scores[kind.index()]);
        let (strength_metric, focus_metric) = strength_and_focus(&scores);

        Ok(Self {
            id: new_scan_id(),
            created_at,
            overall_score: weights.overall_score(&scores),
            metrics: ScanMetrics {
                acne: metric(MetricKind::Acne),
                redness: metric(MetricKind::Redness),
                texture: metric(MetricKind::Texture),
                fine_lines: metric(MetricKind::FineLines),
                dark_spots: metric(MetricKind::DarkSpots),
            },
            strength_metric,
            focus_metric,
            image_reference,
            unlocked: false,
        })
    }

    /// The `count` lowest-scoring axes, lowest first. Equal scores keep
    /// the fixed axis order.
    pub fn focus_areas(&self, count: usize) -> Vec<MetricKind> {
        let mut ranked: Vec<(MetricKind, u8)> =
            self.metrics.iter().map(|(kind, m)| (kind, m.score)).collect();
        ranked.sort_by_key(|&(_, score)| score);
        ranked.into_iter().take(count).map(|(kind, _)| kind).collect()
    }

    /// Merge a patch. `unlocked` only ever moves from `false` to `true`.
    pub fn apply_patch(&mut self, patch: &ScanPatch) {
        if patch.unlocked == Some(true) {
            self.unlocked = true;
        }
        if let Some(image_reference) = &patch.image_reference {
            self.image_reference = image_reference.clone();
        }
    }
}

/// Generate a fresh opaque scan id.
pub fn new_scan_id() -> String {
    format!("{SCAN_ID_PREFIX}{}", Uuid::now_v7().simple())
}

// ---------------------------------------------------------------------------
// ScanPatch
// ---------------------------------------------------------------------------

/// Partial update of the mutable fields of a [`ScanResult`].
///
/// Identity, timestamps and every score-derived field are immutable and
/// deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<bool>,
    /// `Some(None)` clears the stored image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<Option<String>>,
}

impl ScanPatch {
    pub fn unlock() -> Self {
        Self {
            unlocked: Some(true),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Producers
// ---------------------------------------------------------------------------

/// Draw five scores uniformly from [`SYNTHETIC_SCORE_RANGE`].
pub fn synthetic_scores<R: Rng>(rng: &mut R) -> [u8; METRIC_COUNT] {
    std::array::from_fn(|_| rng.random_range(SYNTHETIC_SCORE_RANGE))
}

/// Build a synthetic scan the way the local mock producer does.
pub fn synthesize_scan<R: Rng>(
    rng: &mut R,
    weights: &ScoreWeights,
    image_reference: Option<String>,
) -> Result<ScanResult, CoreError> {
    let scores = synthetic_scores(rng);
    ScanResult::from_scores(scores, weights, image_reference, Utc::now())
}

/// The fixed JSON shape the external scoring oracle answers with.
///
/// Unknown fields are ignored so the oracle can add diagnostics freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleReport {
    pub acne: u8,
    pub redness: u8,
    pub texture: u8,
    pub fine_lines: u8,
    pub dark_spots: u8,
}

impl OracleReport {
    pub fn scores(&self) -> [u8; METRIC_COUNT] {
        [
            self.acne,
            self.redness,
            self.texture,
            self.fine_lines,
            self.dark_spots,
        ]
    }

    /// Convert the oracle's answer into a locked scan.
    pub fn into_scan(
        self,
        weights: &ScoreWeights,
        image_reference: Option<String>,
    ) -> Result<ScanResult, CoreError> {
        ScanResult::from_scores(self.scores(), weights, image_reference, Utc::now())
    }
}
