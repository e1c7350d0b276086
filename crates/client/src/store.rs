//! The user's scan history.
//!
//! History is kept most-recent-first under [`HISTORY_KEY`] as a versioned
//! envelope `{ "version": n, "scans": [...] }`. Every mutation reads the
//! envelope, changes it and writes it back with a compare-and-set against
//! what was read; a concurrent writer that got there first turns the
//! second write into [`StoreError::StaleWrite`] instead of a lost update.
//! A bare JSON array (the older layout) reads as version 0.
//!
//! Absent or unreadable data always reads as empty.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skinscan_core::progress::ProgressSummary;
use skinscan_core::scan::{ScanPatch, ScanResult};
use skinscan_core::scoring::MetricKind;

use crate::backend::StorageBackend;

pub const HISTORY_KEY: &str = "skinscan_history";
pub const CURRENT_KEY: &str = "skinscan_current";

/// Number of metrics a routine focuses on.
pub const ROUTINE_FOCUS_COUNT: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] std::io::Error),

    #[error("Failed to serialize scan data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Scan history changed since it was read (read version {expected}, found {found})")]
    StaleWrite { expected: u64, found: u64 },

    #[error("Scan {0} is locked")]
    Locked(String),
}

// ---------------------------------------------------------------------------
// Persisted layout
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEnvelope {
    version: u64,
    scans: Vec<ScanResult>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedHistory {
    Versioned(HistoryEnvelope),
    Legacy(Vec<ScanResult>),
}

/// History as read at one point, for a later [`ScanRecordStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub version: u64,
    /// Most recent first.
    pub scans: Vec<ScanResult>,
    raw: Option<String>,
}

impl HistorySnapshot {
    fn decode(raw: Option<String>) -> Self {
        let parsed = raw
            .as_deref()
            .map(serde_json::from_str::<PersistedHistory>);

        let (version, scans) = match parsed {
            None => (0, Vec::new()),
            Some(Ok(PersistedHistory::Versioned(envelope))) => (envelope.version, envelope.scans),
            Some(Ok(PersistedHistory::Legacy(scans))) => (0, scans),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Scan history is unreadable; treating as empty");
                (0, Vec::new())
            }
        };

        Self {
            version,
            scans,
            raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ScanRecordStore {
    backend: Arc<dyn StorageBackend>,
}

impl ScanRecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Read the history for a read-modify-write cycle.
    pub fn load(&self) -> HistorySnapshot {
        let raw = self.backend.get(HISTORY_KEY).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read scan history; treating as empty");
            None
        });
        HistorySnapshot::decode(raw)
    }

    /// Persist `snapshot.scans` if nobody has written since `snapshot`
    /// was loaded.
    pub fn commit(&self, snapshot: &HistorySnapshot) -> Result<(), StoreError> {
        let envelope = HistoryEnvelope {
            version: snapshot.version + 1,
            scans: snapshot.scans.clone(),
        };
        let value = serde_json::to_string(&envelope)?;

        let written =
            self.backend
                .compare_and_set(HISTORY_KEY, snapshot.raw.as_deref(), &value)?;
        if !written {
            let found = self.load().version;
            tracing::warn!(expected = snapshot.version, found, "Rejected stale history write");
            return Err(StoreError::StaleWrite {
                expected: snapshot.version,
                found,
            });
        }
        Ok(())
    }

    /// Prepend `scan` to the history.
    pub fn save(&self, scan: ScanResult) -> Result<(), StoreError> {
        let mut snapshot = self.load();
        tracing::debug!(scan_id = %scan.id, "Saving scan");
        snapshot.scans.insert(0, scan);
        self.commit(&snapshot)
    }

    /// Full history, most recent first.
    pub fn get_all(&self) -> Vec<ScanResult> {
        self.load().scans
    }

    pub fn get_by_id(&self, id: &str) -> Option<ScanResult> {
        self.load().scans.into_iter().find(|scan| scan.id == id)
    }

    /// Merge `patch` into the scan with `id`. Absent ids are a no-op.
    pub fn update(&self, id: &str, patch: &ScanPatch) -> Result<(), StoreError> {
        let mut snapshot = self.load();
        let Some(scan) = snapshot.scans.iter_mut().find(|scan| scan.id == id) else {
            tracing::debug!(scan_id = %id, "Update for unknown scan ignored");
            return Ok(());
        };
        scan.apply_patch(patch);
        self.commit(&snapshot)
    }

    pub fn unlock(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, &ScanPatch::unlock())
    }

    // -- scan in progress --

    pub fn set_current(&self, scan: &ScanResult) -> Result<(), StoreError> {
        let value = serde_json::to_string(scan)?;
        self.backend.set(CURRENT_KEY, &value)?;
        Ok(())
    }

    pub fn get_current(&self) -> Option<ScanResult> {
        let raw = match self.backend.get(CURRENT_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read current scan");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!(error = %e, "Current scan is unreadable"))
            .ok()
    }

    pub fn clear_current(&self) -> Result<(), StoreError> {
        self.backend.remove(CURRENT_KEY)?;
        Ok(())
    }

    // -- derived views --

    /// The lowest-scoring metrics of an unlocked scan, lowest first.
    pub fn routine_focus(&self, id: &str) -> Result<Option<Vec<MetricKind>>, StoreError> {
        let Some(scan) = self.get_by_id(id) else {
            return Ok(None);
        };
        if !scan.unlocked {
            return Err(StoreError::Locked(scan.id));
        }
        Ok(Some(scan.focus_areas(ROUTINE_FOCUS_COUNT)))
    }

    pub fn progress(&self) -> ProgressSummary {
        ProgressSummary::from_history(&self.get_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use skinscan_core::scoring::ScoreWeights;

    fn store() -> (ScanRecordStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (ScanRecordStore::new(backend.clone()), backend)
    }

    fn scan(scores: [u8; 5]) -> ScanResult {
        ScanResult::from_scores(scores, &ScoreWeights::default(), None, Utc::now()).unwrap()
    }

    #[test]
    fn empty_store_reads_empty() {
        let (store, _) = store();
        assert!(store.get_all().is_empty());
        assert_eq!(store.get_by_id("scan_missing"), None);
        assert_eq!(store.get_current(), None);
        assert_eq!(store.load().version, 0);
    }

    #[test]
    fn save_prepends() {
        let (store, _) = store();
        let a = scan([8, 8, 8, 8, 8]);
        let b = scan([7, 7, 7, 7, 7]);

        store.save(a.clone()).unwrap();
        assert_eq!(store.get_all(), vec![a.clone()]);

        store.save(b.clone()).unwrap();
        assert_eq!(store.get_all(), vec![b, a]);
        assert_eq!(store.load().version, 2);
    }

    #[test]
    fn empty_patch_leaves_record_unchanged() {
        let (store, _) = store();
        let a = scan([8, 7, 9, 6, 7]);
        store.save(a.clone()).unwrap();

        store.update(&a.id, &ScanPatch::default()).unwrap();
        assert_eq!(store.get_by_id(&a.id), Some(a));
    }

    #[test]
    fn update_of_unknown_id_is_a_noop() {
        let (store, _) = store();
        store.save(scan([8, 8, 8, 8, 8])).unwrap();
        let before = store.load();

        store.update("scan_nope", &ScanPatch::unlock()).unwrap();
        assert_eq!(store.load(), before);
    }

    #[test]
    fn unlock_is_one_way_and_repeatable() {
        let (store, _) = store();
        let a = scan([8, 8, 8, 8, 8]);
        store.save(a.clone()).unwrap();

        store.unlock(&a.id).unwrap();
        store.unlock(&a.id).unwrap();
        assert!(store.get_by_id(&a.id).unwrap().unlocked);

        let relock = ScanPatch {
            unlocked: Some(false),
            ..ScanPatch::default()
        };
        store.update(&a.id, &relock).unwrap();
        assert!(store.get_by_id(&a.id).unwrap().unlocked);
    }

    #[test]
    fn patch_sets_and_clears_image_reference() {
        let (store, _) = store();
        let a = scan([8, 8, 8, 8, 8]);
        store.save(a.clone()).unwrap();

        let set = ScanPatch {
            image_reference: Some(Some("data:image/jpeg;base64,AAAA".into())),
            ..ScanPatch::default()
        };
        store.update(&a.id, &set).unwrap();
        assert!(store.get_by_id(&a.id).unwrap().image_reference.is_some());

        let clear = ScanPatch {
            image_reference: Some(None),
            ..ScanPatch::default()
        };
        store.update(&a.id, &clear).unwrap();
        assert_eq!(store.get_by_id(&a.id).unwrap().image_reference, None);
    }

    #[test]
    fn concurrent_rewrite_is_rejected() {
        let (store, _) = store();
        store.save(scan([8, 8, 8, 8, 8])).unwrap();

        let mut first = store.load();
        let mut second = store.load();

        first.scans.insert(0, scan([9, 9, 9, 9, 9]));
        store.commit(&first).unwrap();

        second.scans.insert(0, scan([7, 7, 7, 7, 7]));
        assert_matches!(
            store.commit(&second),
            Err(StoreError::StaleWrite { expected: 1, found: 2 })
        );
        assert_eq!(store.get_all().len(), 2);
    }

    #[test]
    fn corrupt_history_reads_as_empty_and_can_be_overwritten() {
        let (store, backend) = store();
        backend.set(HISTORY_KEY, "{not json").unwrap();
        assert!(store.get_all().is_empty());

        store.save(scan([8, 8, 8, 8, 8])).unwrap();
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn legacy_array_reads_as_version_zero() {
        let (store, backend) = store();
        let a = scan([8, 8, 8, 8, 8]);
        backend
            .set(HISTORY_KEY, &serde_json::to_string(&vec![a.clone()]).unwrap())
            .unwrap();

        let snapshot = store.load();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.scans, vec![a]);

        store.save(scan([7, 7, 7, 7, 7])).unwrap();
        let raw = backend.get(HISTORY_KEY).unwrap().unwrap();
        assert!(raw.starts_with(r#"{"version":1"#));
    }

    #[test]
    fn current_slot_is_independent_of_history() {
        let (store, backend) = store();
        let a = scan([8, 8, 8, 8, 8]);

        store.set_current(&a).unwrap();
        assert_eq!(store.get_current(), Some(a));
        assert!(store.get_all().is_empty());

        store.clear_current().unwrap();
        assert_eq!(store.get_current(), None);

        backend.set(CURRENT_KEY, "garbage").unwrap();
        assert_eq!(store.get_current(), None);
    }

    #[test]
    fn routine_focus_requires_unlock() {
        let (store, _) = store();
        let a = scan([9, 8, 7, 9, 6]);
        store.save(a.clone()).unwrap();

        assert_matches!(store.routine_focus(&a.id), Err(StoreError::Locked(id)) if id == a.id);
        assert_matches!(store.routine_focus("scan_missing"), Ok(None));

        store.unlock(&a.id).unwrap();
        assert_eq!(
            store.routine_focus(&a.id).unwrap(),
            Some(vec![MetricKind::DarkSpots, MetricKind::Texture])
        );
    }

    #[test]
    fn progress_over_saved_history() {
        let (store, _) = store();
        let mut older = scan([7, 7, 7, 7, 7]);
        older.created_at = Utc::now() - Duration::days(7);
        store.save(older).unwrap();
        store.save(scan([8, 8, 8, 8, 8])).unwrap();

        let summary = store.progress();
        assert_eq!(summary.scan_count, 2);
        assert_eq!(summary.change_from_previous, Some(10));
        assert_eq!(summary.improvement_percent, 14);
    }
}
