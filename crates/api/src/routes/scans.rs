//! Route definitions for scan analysis and eligibility.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{analyze, eligibility};
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// ```text
/// POST       /analyze           -> analyze::analyze
/// GET, POST  /scan-eligibility  -> eligibility::check_eligibility
/// ```
pub fn router(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/analyze",
            post(analyze::analyze).layer(DefaultBodyLimit::max(
                max_image_bytes + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route(
            "/scan-eligibility",
            get(eligibility::check_eligibility).post(eligibility::check_eligibility),
        )
}
