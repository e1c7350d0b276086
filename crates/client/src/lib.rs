//! Client-side SkinScan library.
//!
//! Holds the user's scan history ([`store`]), produces scans locally or
//! through the server ([`analyzer`]), talks to the server endpoints
//! ([`api_client`]) and ties capture, persistence and unlocking together
//! ([`session`]).

pub mod analyzer;
pub mod api_client;
pub mod backend;
pub mod session;
pub mod store;

pub use analyzer::{AnalyzeError, CapturedImage, MockAnalyzer, RemoteAnalyzer, SkinAnalyzer};
pub use api_client::{ClientError, SkinScanClient};
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use session::{ScanSession, SessionError};
pub use store::{ScanRecordStore, StoreError};
