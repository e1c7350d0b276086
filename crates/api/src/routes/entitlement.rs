use axum::routing::get;
use axum::Router;

use crate::handlers::entitlement;
use crate::state::AppState;

/// Routes mounted at `/me`.
///
/// ```text
/// GET /entitlement  -> get_entitlement
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/entitlement", get(entitlement::get_entitlement))
}
