//! Processed billing events and the outcome of applying one.

use skinscan_core::entitlement::{
    EntitlementKey, EntitlementUpdate, SubscriptionIdChange, SubscriptionTier,
};
use skinscan_core::types::Timestamp;
use sqlx::FromRow;

/// A row from `processed_billing_events`, kept for deduplication.
#[derive(Debug, Clone, FromRow)]
pub struct ProcessedBillingEvent {
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: Timestamp,
    pub processed_at: Timestamp,
}

/// What happened when a billing event reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was written to `updated` entitlements.
    Applied { updated: usize },
    /// The event id was already processed; nothing changed.
    Duplicate,
    /// Every matching entitlement had already seen a newer event.
    Stale,
    /// No entitlement matched the event's key.
    NoMatch,
    /// No entitlement carries the email yet. The update is held and
    /// applied when a record with that email is next loaded.
    Held,
    /// The event carried no tier change and was only recorded.
    Ignored,
}

/// An email-keyed update waiting for its user's first authenticated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBillingUpdate {
    /// Lower-cased checkout email.
    pub email: String,
    pub event_id: String,
    pub update: EntitlementUpdate,
    pub occurred_at: Timestamp,
}

impl PendingBillingUpdate {
    pub fn new(email: &str, event_id: &str, update: &EntitlementUpdate, occurred_at: Timestamp) -> Self {
        Self {
            email: email.to_lowercase(),
            event_id: event_id.to_string(),
            update: update.clone(),
            occurred_at,
        }
    }
}

/// A row from `pending_billing_updates`.
#[derive(Debug, Clone, FromRow)]
pub struct PendingBillingRow {
    pub email: String,
    pub event_id: String,
    pub subscription_tier: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub occurred_at: Timestamp,
}

impl From<PendingBillingRow> for PendingBillingUpdate {
    fn from(row: PendingBillingRow) -> Self {
        // Only checkouts are held, and those set or keep the subscription id.
        let subscription_id = match row.stripe_subscription_id {
            Some(id) => SubscriptionIdChange::Set(id),
            None => SubscriptionIdChange::Keep,
        };
        Self {
            update: EntitlementUpdate {
                key: EntitlementKey::Email(row.email.clone()),
                tier: SubscriptionTier::from_db(&row.subscription_tier),
                customer_id: row.stripe_customer_id,
                subscription_id,
            },
            email: row.email,
            event_id: row.event_id,
            occurred_at: row.occurred_at,
        }
    }
}
