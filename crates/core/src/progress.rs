//! Score trend over a scan history.

use serde::{Deserialize, Serialize};

use crate::scan::ScanResult;
use crate::types::Timestamp;

/// One point on the score timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPoint {
    pub created_at: Timestamp,
    pub overall_score: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub scan_count: usize,
    pub latest_score: Option<u8>,
    pub previous_score: Option<u8>,
    /// Latest minus previous; absent with fewer than two scans.
    pub change_from_previous: Option<i32>,
    /// Percent change from the first scan to the latest, rounded.
    pub improvement_percent: i32,
    /// Oldest first.
    pub timeline: Vec<ProgressPoint>,
}

impl ProgressSummary {
    /// Summarise a most-recent-first history.
    pub fn from_history(history: &[ScanResult]) -> Self {
        let timeline: Vec<ProgressPoint> = history
            .iter()
            .rev()
            .map(|scan| ProgressPoint {
                created_at: scan.created_at,
                overall_score: scan.overall_score,
            })
            .collect();

        let latest_score = history.first().map(|s| s.overall_score);
        let previous_score = history.get(1).map(|s| s.overall_score);

        let change_from_previous = match (latest_score, previous_score) {
            (Some(latest), Some(previous)) => Some(i32::from(latest) - i32::from(previous)),
            _ => None,
        };

        let improvement_percent = match (history.first(), history.last()) {
            (Some(latest), Some(first)) if history.len() >= 2 && first.overall_score > 0 => {
                let first = f64::from(first.overall_score);
                let latest = f64::from(latest.overall_score);
                ((latest - first) / first * 100.0).round() as i32
            }
            _ => 0,
        };

        Self {
            scan_count: history.len(),
            latest_score,
            previous_score,
            change_from_previous,
            improvement_percent,
            timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreWeights;
    use chrono::{Duration, TimeZone, Utc};

    fn scan_at(days: i64, scores: [u8; 5]) -> ScanResult {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(days);
        ScanResult::from_scores(scores, &ScoreWeights::default(), None, at).unwrap()
    }

    #[test]
    fn empty_history() {
        let summary = ProgressSummary::from_history(&[]);
        assert_eq!(summary, ProgressSummary::default());
    }

    #[test]
    fn single_scan_has_no_change() {
        let summary = ProgressSummary::from_history(&[scan_at(0, [8, 8, 8, 8, 8])]);
        assert_eq!(summary.scan_count, 1);
        assert_eq!(summary.latest_score, Some(80));
        assert_eq!(summary.previous_score, None);
        assert_eq!(summary.change_from_previous, None);
        assert_eq!(summary.improvement_percent, 0);
        assert_eq!(summary.timeline.len(), 1);
    }

    #[test]
    fn trend_over_three_scans() {
        // Most recent first: 90, 80, 70.
        let history = vec![
            scan_at(14, [9, 9, 9, 9, 9]),
            scan_at(7, [8, 8, 8, 8, 8]),
            scan_at(0, [7, 7, 7, 7, 7]),
        ];
        let summary = ProgressSummary::from_history(&history);
        assert_eq!(summary.latest_score, Some(90));
        assert_eq!(summary.previous_score, Some(80));
        assert_eq!(summary.change_from_previous, Some(10));
        // (90 - 70) / 70 = 28.57% -> 29
        assert_eq!(summary.improvement_percent, 29);
        let scores: Vec<u8> = summary.timeline.iter().map(|p| p.overall_score).collect();
        assert_eq!(scores, vec![70, 80, 90]);
    }

    #[test]
    fn decline_is_negative() {
        let history = vec![scan_at(7, [7, 7, 7, 7, 7]), scan_at(0, [8, 8, 8, 8, 8])];
        let summary = ProgressSummary::from_history(&history);
        assert_eq!(summary.change_from_previous, Some(-10));
        assert_eq!(summary.improvement_percent, -13);
    }
}
