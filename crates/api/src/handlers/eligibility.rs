//! Handler for the free-tier eligibility check.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use skinscan_core::eligibility::EligibilityResponse;

use crate::error::AppResult;
use crate::handlers::load_entitlement;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET|POST /api/v1/scan-eligibility
///
/// Re-evaluated on every call; nothing is cached.
pub async fn check_eligibility(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<EligibilityResponse>> {
    let now = Utc::now();
    let entitlement = load_entitlement(&state, &user, now).await?;
    let eligibility = entitlement.eligibility(now);

    tracing::info!(
        user_id = %user.user_id,
        tier = entitlement.subscription_tier.as_str(),
        eligible = eligibility.is_eligible(),
        reason = eligibility.reason().message(),
        "Scan eligibility decided",
    );

    Ok(Json(eligibility.to_response()))
}
