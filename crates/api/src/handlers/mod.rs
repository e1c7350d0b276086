pub mod achievements;
pub mod analyze;
pub mod billing;
pub mod eligibility;
pub mod entitlement;

use skinscan_core::entitlement::UserEntitlement;
use skinscan_core::types::Timestamp;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Load the caller's entitlement, creating it on first contact and
/// restoring the free allowance if the cooldown window has rolled over.
pub(crate) async fn load_entitlement(
    state: &AppState,
    user: &AuthUser,
    now: Timestamp,
) -> AppResult<UserEntitlement> {
    let allowance = state.config.scans.free_scan_allowance;
    let entitlement = state
        .entitlements
        .find_or_create(user.user_id, user.email.as_deref(), allowance, now)
        .await?;

    if entitlement.clone().roll_window(allowance, now) {
        tracing::debug!(user_id = %user.user_id, "Free scan window rolled over");
        return Ok(state
            .entitlements
            .restore_allowance(user.user_id, allowance, now)
            .await?);
    }
    Ok(entitlement)
}
