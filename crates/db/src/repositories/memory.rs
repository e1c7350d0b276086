//! In-memory repositories for tests and database-less development.
//!
//! Each store keeps its state behind one mutex, so every trait method is
//! atomic just like the single-statement / single-transaction SQL.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use skinscan_core::achievement::{
    Achievement, AwardAchievementRequest, AwardOutcome, COMPLETE_PROGRESS,
};
use skinscan_core::entitlement::{BillingApply, EntitlementKey, UserEntitlement};
use skinscan_core::types::{Timestamp, UserId};

use super::{AchievementRepository, BillingEventRecord, EntitlementRepository};
use crate::models::billing_event::{ApplyOutcome, PendingBillingUpdate, ProcessedBillingEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Entitlements
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EntitlementState {
    entitlements: HashMap<UserId, UserEntitlement>,
    processed: HashMap<String, ProcessedBillingEvent>,
    /// Held checkout updates by lower-cased email.
    pending: HashMap<String, PendingBillingUpdate>,
}

#[derive(Default)]
pub struct InMemoryEntitlementRepo {
    state: Mutex<EntitlementState>,
}

impl InMemoryEntitlementRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record directly.
    pub fn seed(&self, entitlement: UserEntitlement) {
        lock(&self.state)
            .entitlements
            .insert(entitlement.user_id, entitlement);
    }

    pub fn get(&self, user_id: UserId) -> Option<UserEntitlement> {
        lock(&self.state).entitlements.get(&user_id).cloned()
    }

    pub fn pending_for(&self, email: &str) -> Option<PendingBillingUpdate> {
        lock(&self.state).pending.get(&email.to_lowercase()).cloned()
    }
}

#[async_trait]
impl EntitlementRepository for InMemoryEntitlementRepo {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn find_or_create(
        &self,
        user_id: UserId,
        email: Option<&str>,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let mut state = lock(&self.state);
        let EntitlementState {
            entitlements,
            pending,
            ..
        } = &mut *state;

        let entitlement = entitlements.entry(user_id).or_insert_with(|| {
            UserEntitlement::new(user_id, email.map(str::to_string), allowance, now)
        });
        if entitlement.email.is_none() {
            entitlement.email = email.map(str::to_string);
        }

        let held = entitlement
            .email
            .as_deref()
            .and_then(|own| pending.remove(&own.to_lowercase()));
        if let Some(held) = held {
            if entitlement.apply_billing(&held.update, held.occurred_at, now) == BillingApply::Applied {
                tracing::info!(
                    user_id = %user_id,
                    event_id = %held.event_id,
                    "Applied held billing update",
                );
            }
        }

        Ok(entitlement.clone())
    }

    async fn restore_allowance(
        &self,
        user_id: UserId,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let mut state = lock(&self.state);
        let entitlement = state
            .entitlements
            .get_mut(&user_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        entitlement.roll_window(allowance, now);
        Ok(entitlement.clone())
    }

    async fn record_scan(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let mut state = lock(&self.state);
        let entitlement = state
            .entitlements
            .get_mut(&user_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        entitlement.record_scan(now);
        Ok(entitlement.clone())
    }

    async fn apply_billing_event(
        &self,
        event: BillingEventRecord<'_>,
        now: Timestamp,
    ) -> Result<ApplyOutcome, sqlx::Error> {
        let mut state = lock(&self.state);

        if state.processed.contains_key(event.event_id) {
            return Ok(ApplyOutcome::Duplicate);
        }
        state.processed.insert(
            event.event_id.to_string(),
            ProcessedBillingEvent {
                event_id: event.event_id.to_string(),
                event_type: event.event_type.to_string(),
                occurred_at: event.occurred_at,
                processed_at: now,
            },
        );

        let Some(update) = event.update else {
            return Ok(ApplyOutcome::Ignored);
        };

        let mut matched = 0;
        let mut updated = 0;
        for entitlement in state
            .entitlements
            .values_mut()
            .filter(|e| e.matches(&update.key))
        {
            matched += 1;
            if entitlement.apply_billing(update, event.occurred_at, now) == BillingApply::Applied {
                updated += 1;
            }
        }

        if matched == 0 {
            let EntitlementKey::Email(email) = &update.key else {
                return Ok(ApplyOutcome::NoMatch);
            };
            let held = PendingBillingUpdate::new(email, event.event_id, update, event.occurred_at);
            let newer_held = state
                .pending
                .get(&held.email)
                .is_some_and(|existing| existing.occurred_at > held.occurred_at);
            if !newer_held {
                state.pending.insert(held.email.clone(), held);
            }
            return Ok(ApplyOutcome::Held);
        }

        Ok(match (matched, updated) {
            (_, 0) => ApplyOutcome::Stale,
            (_, updated) => ApplyOutcome::Applied { updated },
        })
    }

    async fn find_processed_event(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedBillingEvent>, sqlx::Error> {
        Ok(lock(&self.state).processed.get(event_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Achievements
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAchievementRepo {
    achievements: Mutex<Vec<Achievement>>,
}

impl InMemoryAchievementRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AchievementRepository for InMemoryAchievementRepo {
    async fn award(
        &self,
        user_id: UserId,
        input: &AwardAchievementRequest,
        now: Timestamp,
    ) -> Result<AwardOutcome, sqlx::Error> {
        let mut achievements = lock(&self.achievements);

        let exists = achievements.iter().any(|a| {
            a.user_id == user_id
                && a.achievement_type == input.achievement_type
                && a.achievement_name == input.achievement_name
        });
        if exists {
            return Ok(AwardOutcome::AlreadyUnlocked);
        }

        let achievement = Achievement {
            id: achievements.len() as i64 + 1,
            user_id,
            achievement_type: input.achievement_type.clone(),
            achievement_name: input.achievement_name.clone(),
            achievement_description: input.achievement_description.clone(),
            progress: COMPLETE_PROGRESS,
            unlocked_at: now,
        };
        achievements.push(achievement.clone());
        Ok(AwardOutcome::Awarded(achievement))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Achievement>, sqlx::Error> {
        let mut owned: Vec<Achievement> = lock(&self.achievements)
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.unlocked_at.cmp(&a.unlocked_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }
}
