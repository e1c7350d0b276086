use std::sync::Arc;

use skinscan_db::repositories::{AchievementRepository, EntitlementRepository};
use skinscan_oracle::OracleClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Per-user tier and scan allowance, plus processed billing events.
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
    /// Client for the external scoring oracle.
    pub oracle: Arc<OracleClient>,
}
