//! Handler for payment processor webhooks.
//!
//! Delivery is at-least-once. Duplicates are dropped by event id and
//! out-of-order events by the entitlement's `billing_synced_at`, both
//! inside the repository. Once an event is verified and parsed it is
//! always acknowledged, even if persisting it fails.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use skinscan_core::billing::{BillingEvent, BillingEventKind};
use skinscan_core::signature::{verify_signature, SIGNATURE_HEADER};
use skinscan_db::models::billing_event::ApplyOutcome;
use skinscan_db::repositories::BillingEventRecord;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Acknowledgement body.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /api/v1/billing/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    verify(&state, &headers, &body)?;

    let event = BillingEvent::parse(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Billing event received");

    let update = event.entitlement_update();
    if update.is_none() {
        match &event.kind {
            BillingEventKind::CheckoutCompleted { .. } => tracing::warn!(
                event_id = %event.id,
                "Checkout completed without a customer email; cannot attribute upgrade",
            ),
            _ => tracing::debug!(event_type = %event.event_type, "Unhandled billing event type"),
        }
    }

    let record = BillingEventRecord {
        event_id: &event.id,
        event_type: &event.event_type,
        occurred_at: event.occurred_at,
        update: update.as_ref(),
    };

    match state.entitlements.apply_billing_event(record, Utc::now()).await {
        Ok(ApplyOutcome::Applied { updated }) => tracing::info!(
            event_id = %event.id,
            tier = update.as_ref().map(|u| u.tier.as_str()).unwrap_or_default(),
            updated,
            "Subscription tier changed",
        ),
        Ok(ApplyOutcome::Duplicate) => {
            tracing::info!(event_id = %event.id, "Duplicate billing event ignored")
        }
        Ok(ApplyOutcome::Stale) => {
            tracing::warn!(event_id = %event.id, "Stale billing event ignored")
        }
        Ok(ApplyOutcome::Held) => tracing::info!(
            event_id = %event.id,
            "Checkout email has no account yet; upgrade held until first sign-in",
        ),
        Ok(ApplyOutcome::NoMatch) => {
            tracing::warn!(event_id = %event.id, "Billing event matched no user")
        }
        Ok(ApplyOutcome::Ignored) => {}
        Err(e) => tracing::error!(
            event_id = %event.id,
            error = %e,
            "Failed to persist billing event",
        ),
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Check the signature header, or allow unsigned events when explicitly
/// configured to.
fn verify(state: &AppState, headers: &HeaderMap, body: &[u8]) -> AppResult<()> {
    let billing = &state.config.billing;
    match &billing.webhook_secret {
        Some(secret) => {
            let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
            verify_signature(
                header,
                body,
                secret,
                billing.signature_tolerance_secs,
                Utc::now(),
            )
            .map_err(|e| {
                tracing::warn!(error = %e, "Billing webhook signature rejected");
                AppError::BadRequest(format!("Webhook signature verification failed: {e}"))
            })
        }
        None if billing.allow_unsigned => {
            tracing::warn!("Accepting unsigned billing webhook (BILLING_ALLOW_UNSIGNED is set)");
            Ok(())
        }
        None => Err(AppError::InternalError(
            "Billing webhook secret is not configured".into(),
        )),
    }
}
