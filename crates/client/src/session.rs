//! The capture flow: analyze a photo, keep it as the scan in progress,
//! add it to history, and later unlock it.

use std::sync::Arc;

use skinscan_core::scan::ScanResult;

use crate::analyzer::{AnalyzeError, CapturedImage, SkinAnalyzer};
use crate::store::{ScanRecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No scan in progress")]
    NoCurrentScan,
}

pub struct ScanSession {
    analyzer: Arc<dyn SkinAnalyzer>,
    store: ScanRecordStore,
}

impl ScanSession {
    pub fn new(analyzer: Arc<dyn SkinAnalyzer>, store: ScanRecordStore) -> Self {
        Self { analyzer, store }
    }

    pub fn store(&self) -> &ScanRecordStore {
        &self.store
    }

    /// Analyze `image`, then persist the result as both the current scan
    /// and the newest history entry. Nothing is stored if analysis fails.
    pub async fn capture(&self, image: CapturedImage) -> Result<ScanResult, SessionError> {
        let scan = self.analyzer.analyze(image).await?;
        self.store.set_current(&scan)?;
        self.store.save(scan.clone())?;
        tracing::info!(scan_id = %scan.id, overall = scan.overall_score, "Scan captured");
        Ok(scan)
    }

    /// Unlock the scan in progress in both the history and the current slot.
    pub fn unlock_current(&self) -> Result<ScanResult, SessionError> {
        let mut current = self.store.get_current().ok_or(SessionError::NoCurrentScan)?;
        self.store.unlock(&current.id)?;
        current.unlocked = true;
        self.store.set_current(&current)?;
        Ok(current)
    }

    /// Leave the results view; history is kept.
    pub fn finish(&self) -> Result<(), SessionError> {
        self.store.clear_current()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MockAnalyzer;
    use crate::backend::MemoryBackend;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use skinscan_core::error::CoreError;
    use std::time::Duration;

    fn session(analyzer: Arc<dyn SkinAnalyzer>) -> ScanSession {
        ScanSession::new(analyzer, ScanRecordStore::new(Arc::new(MemoryBackend::new())))
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl SkinAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _image: CapturedImage) -> Result<ScanResult, AnalyzeError> {
            Err(CoreError::Validation("metric score out of range".into()).into())
        }
    }

    #[tokio::test]
    async fn capture_unlock_finish() {
        let session = session(Arc::new(MockAnalyzer::new().with_delay(Duration::ZERO)));

        let scan = session.capture(CapturedImage::new(vec![1])).await.unwrap();
        assert_eq!(session.store().get_current(), Some(scan.clone()));
        assert_eq!(session.store().get_all(), vec![scan.clone()]);

        let unlocked = session.unlock_current().unwrap();
        assert!(unlocked.unlocked);
        assert!(session.store().get_by_id(&scan.id).unwrap().unlocked);
        assert!(session.store().get_current().unwrap().unlocked);

        session.finish().unwrap();
        assert_eq!(session.store().get_current(), None);
        assert_eq!(session.store().get_all().len(), 1);
    }

    #[tokio::test]
    async fn failed_analysis_stores_nothing() {
        let session = session(Arc::new(FailingAnalyzer));

        let result = session.capture(CapturedImage::new(vec![1])).await;
        assert_matches!(result, Err(SessionError::Analyze(AnalyzeError::Invalid(_))));
        assert!(session.store().get_all().is_empty());
        assert_eq!(session.store().get_current(), None);
    }

    #[test]
    fn unlock_without_current_scan_fails() {
        let session = session(Arc::new(MockAnalyzer::new()));
        assert_matches!(session.unlock_current(), Err(SessionError::NoCurrentScan));
    }
}
