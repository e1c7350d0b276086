use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use skinscan_core::entitlement::SubscriptionTier;
use skinscan_core::types::Timestamp;

use crate::error::AppResult;
use crate::handlers::load_entitlement;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// The caller's entitlement as seen by the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementView {
    pub subscription_tier: SubscriptionTier,
    pub is_premium: bool,
    pub free_scans_remaining: i32,
    pub total_scans: i64,
    pub last_free_scan_at: Option<Timestamp>,
    pub next_free_scan_at: Option<Timestamp>,
    pub eligible: bool,
}

/// GET /api/v1/me/entitlement
pub async fn get_entitlement(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<EntitlementView>>> {
    let now = Utc::now();
    let entitlement = load_entitlement(&state, &user, now).await?;

    Ok(Json(DataResponse {
        data: EntitlementView {
            subscription_tier: entitlement.subscription_tier,
            is_premium: entitlement.subscription_tier.is_premium(),
            free_scans_remaining: entitlement.free_scans_remaining,
            total_scans: entitlement.total_scans,
            last_free_scan_at: entitlement.last_free_scan_at,
            next_free_scan_at: entitlement.next_free_scan_at(now),
            eligible: entitlement.authorize_scan(now).is_ok(),
        },
    }))
}
