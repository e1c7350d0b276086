//! Subscription tier and free-scan allowance held server-side per user.
//!
//! Every mutation of a [`UserEntitlement`] goes through a method here so
//! the PostgreSQL and in-memory repositories apply identical rules.

use serde::{Deserialize, Serialize};

use crate::eligibility::{check_eligibility, Eligibility, EligibilityReason};
use crate::error::CoreError;
use crate::types::{Timestamp, UserId};

/// Free scans granted to a new user and restored when a cooldown window
/// rolls over.
pub const DEFAULT_FREE_SCAN_ALLOWANCE: i32 = 1;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }

    /// Parse a stored tier. Legacy `"pro"` rows count as premium; anything
    /// unrecognised is free.
    pub fn from_db(value: &str) -> Self {
        match value {
            "premium" | "pro" => SubscriptionTier::Premium,
            _ => SubscriptionTier::Free,
        }
    }

    pub fn is_premium(self) -> bool {
        self == SubscriptionTier::Premium
    }
}

// ---------------------------------------------------------------------------
// Billing-driven updates
// ---------------------------------------------------------------------------

/// How a billing event locates the entitlement it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementKey {
    /// Contact address captured at checkout.
    Email(String),
    /// Payment processor customer id.
    Customer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionIdChange {
    Keep,
    Set(String),
    Clear,
}

/// A tier change derived from one billing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementUpdate {
    pub key: EntitlementKey,
    pub tier: SubscriptionTier,
    /// Customer id to record, when the event carries one.
    pub customer_id: Option<String>,
    pub subscription_id: SubscriptionIdChange,
}

/// Result of applying an [`EntitlementUpdate`] to one entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingApply {
    Applied,
    /// The event is older than the last one applied and was skipped.
    Stale,
}

// ---------------------------------------------------------------------------
// UserEntitlement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntitlement {
    pub user_id: UserId,
    pub email: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub last_free_scan_at: Option<Timestamp>,
    pub free_scans_remaining: i32,
    pub total_scans: i64,
    /// Occurred-at time of the newest billing event applied so far.
    pub billing_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserEntitlement {
    /// A first-contact free-tier record.
    pub fn new(user_id: UserId, email: Option<String>, allowance: i32, now: Timestamp) -> Self {
        Self {
            user_id,
            email,
            subscription_tier: SubscriptionTier::Free,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            last_free_scan_at: None,
            free_scans_remaining: allowance.max(0),
            total_scans: 0,
            billing_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn eligibility(&self, now: Timestamp) -> Eligibility {
        check_eligibility(self.subscription_tier, self.last_free_scan_at, now)
    }

    pub fn matches(&self, key: &EntitlementKey) -> bool {
        match key {
            EntitlementKey::Email(email) => self
                .email
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(email)),
            EntitlementKey::Customer(customer) => {
                self.stripe_customer_id.as_deref() == Some(customer.as_str())
            }
        }
    }

    /// Restore the free allowance once the cooldown window has rolled over.
    ///
    /// Returns `true` when the record changed.
    pub fn roll_window(&mut self, allowance: i32, now: Timestamp) -> bool {
        let rolled_over = matches!(
            self.eligibility(now),
            Eligibility::Eligible(EligibilityReason::FirstFreeScan | EligibilityReason::CooldownExpired)
        );
        if rolled_over && self.free_scans_remaining < allowance {
            self.free_scans_remaining = allowance;
            self.updated_at = now;
            return true;
        }
        false
    }

    /// Gate in front of the analysis proxy: premium passes, a free user
    /// needs an expired cooldown and a remaining allowance.
    pub fn authorize_scan(&self, now: Timestamp) -> Result<Eligibility, CoreError> {
        let eligibility = self.eligibility(now);
        match eligibility {
            Eligibility::CoolingDown {
                next_available_at,
                retry_after_secs,
                ..
            } => Err(CoreError::RateLimited {
                error: "Cooldown active",
                message: format!(
                    "Your next free scan is available at {}. Upgrade to premium for unlimited scans.",
                    next_available_at.to_rfc3339()
                ),
                next_available_at: Some(next_available_at),
                retry_after_secs: Some(retry_after_secs),
            }),
            Eligibility::Eligible(EligibilityReason::Premium) => Ok(eligibility),
            Eligibility::Eligible(_) if self.free_scans_remaining <= 0 => {
                Err(CoreError::RateLimited {
                    error: "No scans remaining",
                    message: "You have used all your free scans. Upgrade to premium for unlimited scans or invite friends to earn more.".to_string(),
                    next_available_at: None,
                    retry_after_secs: None,
                })
            }
            Eligibility::Eligible(_) => Ok(eligibility),
        }
    }

    /// Account for a completed scan. Free scans start a new cooldown and
    /// consume allowance, which never drops below zero.
    pub fn record_scan(&mut self, now: Timestamp) {
        self.total_scans += 1;
        if !self.subscription_tier.is_premium() {
            self.last_free_scan_at = Some(now);
            self.free_scans_remaining = (self.free_scans_remaining - 1).max(0);
        }
        self.updated_at = now;
    }

    /// Apply a billing update that occurred at `occurred_at`.
    ///
    /// Re-applying the same update is a no-op in effect. Updates older
    /// than the newest one already applied are skipped.
    pub fn apply_billing(
        &mut self,
        update: &EntitlementUpdate,
        occurred_at: Timestamp,
        now: Timestamp,
    ) -> BillingApply {
        if self.billing_synced_at.is_some_and(|synced| occurred_at < synced) {
            return BillingApply::Stale;
        }

        self.subscription_tier = update.tier;
        if let Some(customer_id) = &update.customer_id {
            self.stripe_customer_id = Some(customer_id.clone());
        }
        match &update.subscription_id {
            SubscriptionIdChange::Keep => {}
            SubscriptionIdChange::Set(id) => self.stripe_subscription_id = Some(id.clone()),
            SubscriptionIdChange::Clear => self.stripe_subscription_id = None,
        }
        self.billing_synced_at = Some(occurred_at);
        self.updated_at = now;
        BillingApply::Applied
    }

    /// When the next free scan opens up, if the user is cooling down.
    pub fn next_free_scan_at(&self, now: Timestamp) -> Option<Timestamp> {
        match self.eligibility(now) {
            Eligibility::CoolingDown {
                next_available_at, ..
            } => Some(next_available_at),
            Eligibility::Eligible(_) => None,
        }
    }
}
