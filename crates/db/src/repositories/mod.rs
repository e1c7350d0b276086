//! Repository traits and their PostgreSQL / in-memory implementations.
//!
//! Every method returns `sqlx::Error` so callers classify failures the
//! same way whichever store is behind the trait. The in-memory stores
//! report a missing row as [`sqlx::Error::RowNotFound`] like PostgreSQL.

use async_trait::async_trait;
use skinscan_core::achievement::{Achievement, AwardAchievementRequest, AwardOutcome};
use skinscan_core::entitlement::{EntitlementUpdate, UserEntitlement};
use skinscan_core::types::{Timestamp, UserId};

use crate::models::billing_event::{ApplyOutcome, ProcessedBillingEvent};

mod achievement_repo;
mod entitlement_repo;
mod memory;

pub use achievement_repo::PgAchievementRepo;
pub use entitlement_repo::PgEntitlementRepo;
pub use memory::{InMemoryAchievementRepo, InMemoryEntitlementRepo};

/// A billing event ready to be applied.
#[derive(Debug, Clone, Copy)]
pub struct BillingEventRecord<'a> {
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub occurred_at: Timestamp,
    /// `None` for event types that only need recording.
    pub update: Option<&'a EntitlementUpdate>,
}

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Confirm the backing store is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Load the caller's entitlement, creating a free-tier record with
    /// `allowance` free scans on first contact. A known `email` is filled
    /// in when the stored record has none. A billing update held for the
    /// record's email is applied here and released.
    async fn find_or_create(
        &self,
        user_id: UserId,
        email: Option<&str>,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error>;

    /// Restore the free allowance if the cooldown window has rolled over.
    /// Returns the entitlement as stored afterwards.
    async fn restore_allowance(
        &self,
        user_id: UserId,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error>;

    /// Account for one completed scan in a single atomic step.
    async fn record_scan(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error>;

    /// Record the event id and apply its update to every matching
    /// entitlement, atomically. An email-keyed update that matches nothing
    /// is held for [`find_or_create`](Self::find_or_create).
    async fn apply_billing_event(
        &self,
        event: BillingEventRecord<'_>,
        now: Timestamp,
    ) -> Result<ApplyOutcome, sqlx::Error>;

    async fn find_processed_event(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedBillingEvent>, sqlx::Error>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Unlock an achievement. An existing (user, type, name) triple yields
    /// [`AwardOutcome::AlreadyUnlocked`].
    async fn award(
        &self,
        user_id: UserId,
        input: &AwardAchievementRequest,
        now: Timestamp,
    ) -> Result<AwardOutcome, sqlx::Error>;

    /// The user's achievements, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Achievement>, sqlx::Error>;
}
