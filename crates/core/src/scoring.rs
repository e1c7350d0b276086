//! Metric axes, severity bands and the overall score formula.
//!
//! The overall score is `round(Σ wᵢ·sᵢ · 10)` over the five metric scores
//! `sᵢ ∈ [1, 10]`. Weights are held in basis points so the rounding is
//! exact integer arithmetic (half rounds up), which keeps the score a
//! deterministic function of the metrics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowest valid per-metric score.
pub const METRIC_SCORE_MIN: u8 = 1;

/// Highest valid per-metric score.
pub const METRIC_SCORE_MAX: u8 = 10;

/// Number of metric axes. The set is fixed.
pub const METRIC_COUNT: usize = 5;

/// Basis points a weight vector must sum to (1.0).
pub const TOTAL_BASIS_POINTS: u32 = 10_000;

// ---------------------------------------------------------------------------
// Metric axes
// ---------------------------------------------------------------------------

/// The five analysis axes, in their fixed iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    Acne,
    Redness,
    Texture,
    FineLines,
    DarkSpots,
}

impl MetricKind {
    /// All axes in fixed order. Tie-breaks follow this order.
    pub const ALL: [MetricKind; METRIC_COUNT] = [
        MetricKind::Acne,
        MetricKind::Redness,
        MetricKind::Texture,
        MetricKind::FineLines,
        MetricKind::DarkSpots,
    ];

    /// Position of the axis in [`MetricKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            MetricKind::Acne => 0,
            MetricKind::Redness => 1,
            MetricKind::Texture => 2,
            MetricKind::FineLines => 3,
            MetricKind::DarkSpots => 4,
        }
    }

    /// Wire key, matching the serde representation.
    pub fn key(self) -> &'static str {
        match self {
            MetricKind::Acne => "acne",
            MetricKind::Redness => "redness",
            MetricKind::Texture => "texture",
            MetricKind::FineLines => "fineLines",
            MetricKind::DarkSpots => "darkSpots",
        }
    }

    /// User-facing name of the axis.
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Acne => "Clear Complexion",
            MetricKind::Redness => "Even Tone",
            MetricKind::Texture => "Smooth Texture",
            MetricKind::FineLines => "Youthful Appearance",
            MetricKind::DarkSpots => "Radiant Brightness",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MetricKind::Acne => "Analysis of breakouts, blemishes, and acne-prone areas",
            MetricKind::Redness => "Assessment of skin redness and inflammation",
            MetricKind::Texture => "Evaluation of skin smoothness and pore visibility",
            MetricKind::FineLines => "Detection of fine lines and wrinkles",
            MetricKind::DarkSpots => "Identification of hyperpigmentation and dark spots",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity band derived from a metric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
}

impl Severity {
    /// `>= 8` Excellent, `>= 6` Good, `>= 4` Fair, otherwise Needs Attention.
    pub fn from_score(score: u8) -> Self {
        match score {
            8..=u8::MAX => Severity::Excellent,
            6..=7 => Severity::Good,
            4..=5 => Severity::Fair,
            _ => Severity::NeedsAttention,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Excellent => "Excellent",
            Severity::Good => "Good",
            Severity::Fair => "Fair",
            Severity::NeedsAttention => "Needs Attention",
        }
    }
}

/// Reject scores outside `[METRIC_SCORE_MIN, METRIC_SCORE_MAX]`.
pub fn validate_metric_score(kind: MetricKind, score: u8) -> Result<(), CoreError> {
    if (METRIC_SCORE_MIN..=METRIC_SCORE_MAX).contains(&score) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{kind} score must be between {METRIC_SCORE_MIN} and {METRIC_SCORE_MAX}, got {score}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Per-axis weights for the overall score, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    basis_points: [u16; METRIC_COUNT],
}

impl Default for ScoreWeights {
    /// 0.25, 0.20, 0.25, 0.15, 0.15.
    fn default() -> Self {
        Self {
            basis_points: [2500, 2000, 2500, 1500, 1500],
        }
    }
}

impl ScoreWeights {
    /// Build from basis points. The vector must sum to [`TOTAL_BASIS_POINTS`].
    pub fn from_basis_points(basis_points: [u16; METRIC_COUNT]) -> Result<Self, CoreError> {
        let total: u32 = basis_points.iter().map(|&bp| u32::from(bp)).sum();
        if total != TOTAL_BASIS_POINTS {
            return Err(CoreError::Validation(format!(
                "score weights must sum to 1.0, got {:.4}",
                f64::from(total) / f64::from(TOTAL_BASIS_POINTS)
            )));
        }
        Ok(Self { basis_points })
    }

    /// Build from fractional weights (e.g. `0.25`), rounded to basis points.
    pub fn from_fractions(fractions: [f64; METRIC_COUNT]) -> Result<Self, CoreError> {
        let mut basis_points = [0u16; METRIC_COUNT];
        for (slot, fraction) in basis_points.iter_mut().zip(fractions) {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(CoreError::Validation(format!(
                    "score weight {fraction} is outside [0, 1]"
                )));
            }
            *slot = (fraction * f64::from(TOTAL_BASIS_POINTS)).round() as u16;
        }
        Self::from_basis_points(basis_points)
    }

    /// Weight of one axis as a fraction.
    pub fn weight(&self, kind: MetricKind) -> f64 {
        f64::from(self.basis_points[kind.index()]) / f64::from(TOTAL_BASIS_POINTS)
    }

    /// Overall score in `[10, 100]` for scores given in [`MetricKind::ALL`] order.
    pub fn overall_score(&self, scores: &[u8; METRIC_COUNT]) -> u8 {
        let weighted: u32 = self
            .basis_points
            .iter()
            .zip(scores)
            .map(|(&bp, &score)| u32::from(bp) * u32::from(score))
            .sum();
        // weighted / 10_000 * 10, rounded half up.
        ((weighted + 500) / 1000) as u8
    }
}

impl FromStr for ScoreWeights {
    type Err = CoreError;

    /// Parse a comma-separated list of five fractions, e.g.
    /// `"0.25,0.20,0.25,0.15,0.15"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|e| CoreError::Validation(format!("invalid score weight '{p}': {e}")))
            })
            .collect::<Result<_, _>>()?;
        let fractions: [f64; METRIC_COUNT] = parts.try_into().map_err(|v: Vec<f64>| {
            CoreError::Validation(format!(
                "expected {METRIC_COUNT} score weights, got {}",
                v.len()
            ))
        })?;
        Self::from_fractions(fractions)
    }
}

// ---------------------------------------------------------------------------
// Strength / focus
// ---------------------------------------------------------------------------

/// Highest and lowest scoring axes. Ties resolve to the first axis in
/// [`MetricKind::ALL`] order, so equal scores yield the first axis twice.
pub fn strength_and_focus(scores: &[u8; METRIC_COUNT]) -> (MetricKind, MetricKind) {
    let mut strength = 0;
    let mut focus = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[strength] {
            strength = i;
        }
        if score < scores[focus] {
            focus = i;
        }
    }
    (MetricKind::ALL[strength], MetricKind::ALL[focus])
}
