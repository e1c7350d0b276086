//! Row type for the `user_entitlements` table.

use skinscan_core::entitlement::{SubscriptionTier, UserEntitlement};
use skinscan_core::types::{Timestamp, UserId};
use sqlx::FromRow;

/// A row from `user_entitlements`. The tier is stored as text so legacy
/// values survive; [`SubscriptionTier::from_db`] normalises it on read.
#[derive(Debug, Clone, FromRow)]
pub struct EntitlementRow {
    pub user_id: UserId,
    pub email: Option<String>,
    pub subscription_tier: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub last_free_scan_at: Option<Timestamp>,
    pub free_scans_remaining: i32,
    pub total_scans: i64,
    pub billing_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<EntitlementRow> for UserEntitlement {
    fn from(row: EntitlementRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            subscription_tier: SubscriptionTier::from_db(&row.subscription_tier),
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            last_free_scan_at: row.last_free_scan_at,
            free_scans_remaining: row.free_scans_remaining,
            total_scans: row.total_scans,
            billing_synced_at: row.billing_synced_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
