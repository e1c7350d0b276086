//! PostgreSQL store for `user_entitlements` and `processed_billing_events`.

use async_trait::async_trait;
use skinscan_core::eligibility::COOLDOWN_DAYS;
use skinscan_core::entitlement::{
    BillingApply, EntitlementKey, SubscriptionIdChange, UserEntitlement,
};
use skinscan_core::types::{Timestamp, UserId};

use super::{BillingEventRecord, EntitlementRepository};
use crate::models::billing_event::{
    ApplyOutcome, PendingBillingRow, PendingBillingUpdate, ProcessedBillingEvent,
};
use crate::models::entitlement::EntitlementRow;
use crate::DbPool;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    user_id, email, subscription_tier, stripe_customer_id, stripe_subscription_id, \
    last_free_scan_at, free_scans_remaining, total_scans, billing_synced_at, \
    created_at, updated_at";

const EVENT_COLUMNS: &str = "event_id, event_type, occurred_at, processed_at";

const PENDING_COLUMNS: &str = "\
    email, event_id, subscription_tier, stripe_customer_id, stripe_subscription_id, occurred_at";

/// SQL predicate for rows whose stored tier counts as premium.
const IS_PREMIUM: &str = "subscription_tier IN ('premium', 'pro')";

pub struct PgEntitlementRepo {
    pool: DbPool,
}

impl PgEntitlementRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find(&self, user_id: UserId) -> Result<UserEntitlement, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_entitlements WHERE user_id = $1");
        let row = sqlx::query_as::<_, EntitlementRow>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}

/// Persist the billing fields of an entitlement changed by `apply_billing`.
async fn write_billing(
    conn: &mut sqlx::PgConnection,
    entitlement: &UserEntitlement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE user_entitlements SET \
            subscription_tier = $2, stripe_customer_id = $3, \
            stripe_subscription_id = $4, billing_synced_at = $5, updated_at = $6 \
         WHERE user_id = $1",
    )
    .bind(entitlement.user_id)
    .bind(entitlement.subscription_tier.as_str())
    .bind(&entitlement.stripe_customer_id)
    .bind(&entitlement.stripe_subscription_id)
    .bind(entitlement.billing_synced_at)
    .bind(entitlement.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Hold an email-keyed update until a record with that email exists. An
/// already held update that occurred later is kept.
async fn hold_update(
    conn: &mut sqlx::PgConnection,
    held: &PendingBillingUpdate,
    now: Timestamp,
) -> Result<(), sqlx::Error> {
    let subscription_id = match &held.update.subscription_id {
        SubscriptionIdChange::Set(id) => Some(id.as_str()),
        SubscriptionIdChange::Keep | SubscriptionIdChange::Clear => None,
    };
    sqlx::query(
        "INSERT INTO pending_billing_updates \
            (email, event_id, subscription_tier, stripe_customer_id, \
             stripe_subscription_id, occurred_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (email) DO UPDATE SET \
            event_id = EXCLUDED.event_id, \
            subscription_tier = EXCLUDED.subscription_tier, \
            stripe_customer_id = EXCLUDED.stripe_customer_id, \
            stripe_subscription_id = EXCLUDED.stripe_subscription_id, \
            occurred_at = EXCLUDED.occurred_at, \
            created_at = EXCLUDED.created_at \
         WHERE pending_billing_updates.occurred_at <= EXCLUDED.occurred_at",
    )
    .bind(&held.email)
    .bind(&held.event_id)
    .bind(held.update.tier.as_str())
    .bind(&held.update.customer_id)
    .bind(subscription_id)
    .bind(held.occurred_at)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl EntitlementRepository for PgEntitlementRepo {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }

    async fn find_or_create(
        &self,
        user_id: UserId,
        email: Option<&str>,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_entitlements \
                (user_id, email, free_scans_remaining, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (user_id) DO UPDATE \
                SET email = COALESCE(user_entitlements.email, EXCLUDED.email) \
             RETURNING {COLUMNS}"
        );
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, EntitlementRow>(&query)
            .bind(user_id)
            .bind(email)
            .bind(allowance.max(0))
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        let mut entitlement = UserEntitlement::from(row);

        if let Some(own) = entitlement.email.clone() {
            let query = format!(
                "DELETE FROM pending_billing_updates WHERE email = LOWER($1) \
                 RETURNING {PENDING_COLUMNS}"
            );
            let held = sqlx::query_as::<_, PendingBillingRow>(&query)
                .bind(own)
                .fetch_optional(&mut *tx)
                .await?
                .map(PendingBillingUpdate::from);

            if let Some(held) = held {
                if entitlement.apply_billing(&held.update, held.occurred_at, now)
                    == BillingApply::Applied
                {
                    write_billing(&mut tx, &entitlement).await?;
                    tracing::info!(
                        user_id = %user_id,
                        event_id = %held.event_id,
                        "Applied held billing update",
                    );
                }
            }
        }

        tx.commit().await?;
        Ok(entitlement)
    }

    async fn restore_allowance(
        &self,
        user_id: UserId,
        allowance: i32,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements \
             SET free_scans_remaining = $2, updated_at = $3 \
             WHERE user_id = $1 \
               AND NOT {IS_PREMIUM} \
               AND free_scans_remaining < $2 \
               AND (last_free_scan_at IS NULL \
                    OR last_free_scan_at <= $3 - make_interval(days => $4)) \
             RETURNING {COLUMNS}"
        );
        let restored = sqlx::query_as::<_, EntitlementRow>(&query)
            .bind(user_id)
            .bind(allowance.max(0))
            .bind(now)
            .bind(COOLDOWN_DAYS as i32)
            .fetch_optional(&self.pool)
            .await?;

        match restored {
            Some(row) => Ok(row.into()),
            None => self.find(user_id).await,
        }
    }

    async fn record_scan(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<UserEntitlement, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements SET \
                total_scans = total_scans + 1, \
                last_free_scan_at = CASE WHEN {IS_PREMIUM} \
                    THEN last_free_scan_at ELSE $2 END, \
                free_scans_remaining = CASE WHEN {IS_PREMIUM} \
                    THEN free_scans_remaining ELSE GREATEST(free_scans_remaining - 1, 0) END, \
                updated_at = $2 \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, EntitlementRow>(&query)
            .bind(user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn apply_billing_event(
        &self,
        event: BillingEventRecord<'_>,
        now: Timestamp,
    ) -> Result<ApplyOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO processed_billing_events \
                (event_id, event_type, occurred_at, processed_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event.event_id)
        .bind(event.event_type)
        .bind(event.occurred_at)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Duplicate);
        }

        let Some(update) = event.update else {
            tx.commit().await?;
            return Ok(ApplyOutcome::Ignored);
        };

        let (predicate, key) = match &update.key {
            EntitlementKey::Email(email) => ("LOWER(email) = LOWER($1)", email.as_str()),
            EntitlementKey::Customer(customer) => ("stripe_customer_id = $1", customer.as_str()),
        };
        let query =
            format!("SELECT {COLUMNS} FROM user_entitlements WHERE {predicate} FOR UPDATE");
        let rows = sqlx::query_as::<_, EntitlementRow>(&query)
            .bind(key)
            .fetch_all(&mut *tx)
            .await?;

        if rows.is_empty() {
            let outcome = match &update.key {
                EntitlementKey::Email(email) => {
                    let held = PendingBillingUpdate::new(
                        email,
                        event.event_id,
                        update,
                        event.occurred_at,
                    );
                    hold_update(&mut tx, &held, now).await?;
                    ApplyOutcome::Held
                }
                EntitlementKey::Customer(_) => ApplyOutcome::NoMatch,
            };
            tx.commit().await?;
            return Ok(outcome);
        }

        let mut updated = 0;
        for row in rows {
            let mut entitlement = UserEntitlement::from(row);
            if entitlement.apply_billing(update, event.occurred_at, now) == BillingApply::Stale {
                tracing::debug!(
                    user_id = %entitlement.user_id,
                    event_id = event.event_id,
                    "Skipping stale billing event for entitlement",
                );
                continue;
            }

            write_billing(&mut tx, &entitlement).await?;
            updated += 1;
        }

        tx.commit().await?;

        Ok(if updated == 0 {
            ApplyOutcome::Stale
        } else {
            ApplyOutcome::Applied { updated }
        })
    }

    async fn find_processed_event(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedBillingEvent>, sqlx::Error> {
        let query =
            format!("SELECT {EVENT_COLUMNS} FROM processed_billing_events WHERE event_id = $1");
        sqlx::query_as::<_, ProcessedBillingEvent>(&query)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
    }
}
