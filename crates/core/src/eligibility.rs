//! Free-tier scan eligibility (7-day cooldown, premium override).
//!
//! [`check_eligibility`] is a pure function of the subscription tier, the
//! last free scan time and "now". It is re-evaluated on every request and
//! never cached.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::entitlement::SubscriptionTier;
use crate::types::Timestamp;

/// Days a free-tier user waits between scans.
pub const COOLDOWN_DAYS: i64 = 7;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// The cooldown as a duration.
pub fn cooldown() -> Duration {
    Duration::days(COOLDOWN_DAYS)
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Why a scan is (or is not) allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityReason {
    Premium,
    FirstFreeScan,
    CooldownExpired,
    CooldownActive,
}

impl EligibilityReason {
    pub fn message(self) -> &'static str {
        match self {
            EligibilityReason::Premium => "Premium user - unlimited scans",
            EligibilityReason::FirstFreeScan => "First free scan",
            EligibilityReason::CooldownExpired => "Cooldown expired",
            EligibilityReason::CooldownActive => "Cooldown active",
        }
    }
}

/// Outcome of one eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(EligibilityReason),
    CoolingDown {
        next_available_at: Timestamp,
        /// Whole hours until `next_available_at`, rounded up.
        hours_remaining: i64,
        /// `hours_remaining / 24`, rounded up.
        days_remaining: i64,
        /// Whole seconds until `next_available_at`, rounded up.
        retry_after_secs: i64,
    },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }

    pub fn reason(&self) -> EligibilityReason {
        match self {
            Eligibility::Eligible(reason) => *reason,
            Eligibility::CoolingDown { .. } => EligibilityReason::CooldownActive,
        }
    }

    /// Wire representation for the eligibility endpoint.
    pub fn to_response(&self) -> EligibilityResponse {
        match *self {
            Eligibility::Eligible(reason) => EligibilityResponse {
                eligible: true,
                is_premium: reason == EligibilityReason::Premium,
                reason: reason.message().to_string(),
                next_available_date: None,
                hours_remaining: None,
                days_remaining: None,
            },
            Eligibility::CoolingDown {
                next_available_at,
                hours_remaining,
                days_remaining,
                ..
            } => EligibilityResponse {
                eligible: false,
                is_premium: false,
                reason: EligibilityReason::CooldownActive.message().to_string(),
                next_available_date: Some(next_available_at),
                hours_remaining: Some(hours_remaining),
                days_remaining: Some(days_remaining),
            },
        }
    }
}

/// JSON body of the eligibility endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub eligible: bool,
    pub is_premium: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_available_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

/// Decide whether a new scan may be taken.
///
/// Premium is always eligible. A free user is eligible when they have
/// never scanned or the last free scan is at least [`COOLDOWN_DAYS`] old.
pub fn check_eligibility(
    tier: SubscriptionTier,
    last_free_scan_at: Option<Timestamp>,
    now: Timestamp,
) -> Eligibility {
    if tier == SubscriptionTier::Premium {
        return Eligibility::Eligible(EligibilityReason::Premium);
    }

    let Some(last) = last_free_scan_at else {
        return Eligibility::Eligible(EligibilityReason::FirstFreeScan);
    };

    if now - last >= cooldown() {
        return Eligibility::Eligible(EligibilityReason::CooldownExpired);
    }

    let next_available_at = last + cooldown();
    let remaining_ms = (next_available_at - now).num_milliseconds();
    let hours_remaining = ceil_div(remaining_ms, MILLIS_PER_HOUR);

    Eligibility::CoolingDown {
        next_available_at,
        hours_remaining,
        days_remaining: ceil_div(hours_remaining, 24),
        retry_after_secs: ceil_div(remaining_ms, 1000),
    }
}

/// Ceiling division for a non-negative numerator.
fn ceil_div(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// Render the countdown until the next free scan, e.g. `"2d 3h 4m 5s"`.
///
/// Leading zero units are dropped; seconds are always shown. Zero or a
/// negative remainder renders as `"Available now!"`.
pub fn format_countdown(seconds_left: i64) -> String {
    if seconds_left <= 0 {
        return "Available now!".to_string();
    }

    let days = seconds_left / 86_400;
    let hours = (seconds_left % 86_400) / 3_600;
    let minutes = (seconds_left % 3_600) / 60;
    let seconds = seconds_left % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 || days > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}
