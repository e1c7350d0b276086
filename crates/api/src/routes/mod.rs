pub mod achievements;
pub mod billing;
pub mod entitlement;
pub mod health;
pub mod scans;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /analyze               POST       forward an image to the scoring oracle
/// /scan-eligibility      GET, POST  free-tier cooldown check
/// /billing/webhook       POST       payment processor events (signed)
/// /achievements          GET, POST  list / award achievements
/// /me/entitlement        GET        caller's tier and counters
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .merge(scans::router(config.scans.max_image_bytes))
        .nest("/billing", billing::router())
        .nest("/achievements", achievements::router())
        .nest("/me", entitlement::router())
}
