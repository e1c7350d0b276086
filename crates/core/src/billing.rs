//! Payment processor webhook events and the tier changes they imply.
//!
//! Only three event types change state; every other type parses to
//! [`BillingEventKind::Ignored`] and is acknowledged without effect.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::entitlement::{EntitlementKey, EntitlementUpdate, SubscriptionIdChange, SubscriptionTier};
use crate::error::CoreError;
use crate::types::Timestamp;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const EVENT_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";

/// Subscription status that keeps a user premium.
pub const ACTIVE_STATUS: &str = "active";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: Value,
}

// ---------------------------------------------------------------------------
// Parsed events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventKind {
    CheckoutCompleted {
        customer_email: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    SubscriptionDeleted {
        customer_id: String,
    },
    SubscriptionUpdated {
        customer_id: String,
        status: String,
    },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEvent {
    /// External event id, used for deduplication.
    pub id: String,
    pub event_type: String,
    pub occurred_at: Timestamp,
    pub kind: BillingEventKind,
}

impl BillingEvent {
    /// Parse a webhook body.
    pub fn parse(payload: &[u8]) -> Result<Self, CoreError> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| CoreError::Validation(format!("Invalid webhook payload: {e}")))?;

        let occurred_at = DateTime::from_timestamp(raw.created, 0).ok_or_else(|| {
            CoreError::Validation(format!("Invalid event timestamp: {}", raw.created))
        })?;

        let object = &raw.data.object;
        let kind = match raw.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => BillingEventKind::CheckoutCompleted {
                customer_email: string_field(object, "customer_email").or_else(|| {
                    object
                        .get("customer_details")
                        .and_then(|details| string_field(details, "email"))
                }),
                customer_id: id_field(object, "customer"),
                subscription_id: id_field(object, "subscription"),
            },
            EVENT_SUBSCRIPTION_DELETED => BillingEventKind::SubscriptionDeleted {
                customer_id: required_id(object, "customer", &raw.event_type)?,
            },
            EVENT_SUBSCRIPTION_UPDATED => BillingEventKind::SubscriptionUpdated {
                customer_id: required_id(object, "customer", &raw.event_type)?,
                status: string_field(object, "status").ok_or_else(|| {
                    CoreError::Validation(format!("{} is missing status", raw.event_type))
                })?,
            },
            _ => BillingEventKind::Ignored,
        };

        Ok(Self {
            id: raw.id,
            event_type: raw.event_type,
            occurred_at,
            kind,
        })
    }

    /// The entitlement change this event implies, if any.
    ///
    /// A checkout without a contact address cannot be attributed and
    /// yields `None`.
    pub fn entitlement_update(&self) -> Option<EntitlementUpdate> {
        match &self.kind {
            BillingEventKind::CheckoutCompleted {
                customer_email,
                customer_id,
                subscription_id,
            } => Some(EntitlementUpdate {
                key: EntitlementKey::Email(customer_email.clone()?),
                tier: SubscriptionTier::Premium,
                customer_id: customer_id.clone(),
                subscription_id: match subscription_id {
                    Some(id) => SubscriptionIdChange::Set(id.clone()),
                    None => SubscriptionIdChange::Keep,
                },
            }),
            BillingEventKind::SubscriptionDeleted { customer_id } => Some(EntitlementUpdate {
                key: EntitlementKey::Customer(customer_id.clone()),
                tier: SubscriptionTier::Free,
                customer_id: None,
                subscription_id: SubscriptionIdChange::Clear,
            }),
            BillingEventKind::SubscriptionUpdated {
                customer_id,
                status,
            } => Some(EntitlementUpdate {
                key: EntitlementKey::Customer(customer_id.clone()),
                tier: if status == ACTIVE_STATUS {
                    SubscriptionTier::Premium
                } else {
                    SubscriptionTier::Free
                },
                customer_id: None,
                subscription_id: SubscriptionIdChange::Keep,
            }),
            BillingEventKind::Ignored => None,
        }
    }
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read an id that may be either a bare string or an expanded object.
fn id_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        expanded @ Value::Object(_) => string_field(expanded, "id"),
        _ => None,
    }
}

fn required_id(object: &Value, key: &str, event_type: &str) -> Result<String, CoreError> {
    id_field(object, key)
        .ok_or_else(|| CoreError::Validation(format!("{event_type} is missing {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn payload(event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_767_225_600,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn checkout_completed_upgrades_by_email() {
        let body = payload(
            EVENT_CHECKOUT_COMPLETED,
            json!({ "customer": "cus_1", "subscription": "sub_1", "customer_email": "ada@example.com" }),
        );
        let event = BillingEvent::parse(&body).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.occurred_at.timestamp(), 1_767_225_600);

        let update = event.entitlement_update().unwrap();
        assert_eq!(update.key, EntitlementKey::Email("ada@example.com".into()));
        assert_eq!(update.tier, SubscriptionTier::Premium);
        assert_eq!(update.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(update.subscription_id, SubscriptionIdChange::Set("sub_1".into()));
    }

    #[test]
    fn checkout_falls_back_to_customer_details_email() {
        let body = payload(
            EVENT_CHECKOUT_COMPLETED,
            json!({ "customer": { "id": "cus_2" }, "customer_email": null,
                    "customer_details": { "email": "grace@example.com" } }),
        );
        let event = BillingEvent::parse(&body).unwrap();
        let update = event.entitlement_update().unwrap();
        assert_eq!(update.key, EntitlementKey::Email("grace@example.com".into()));
        assert_eq!(update.customer_id.as_deref(), Some("cus_2"));
        assert_eq!(update.subscription_id, SubscriptionIdChange::Keep);
    }

    #[test]
    fn checkout_without_email_has_no_update() {
        let body = payload(EVENT_CHECKOUT_COMPLETED, json!({ "customer": "cus_1" }));
        let event = BillingEvent::parse(&body).unwrap();
        assert!(event.entitlement_update().is_none());
    }

    #[test]
    fn subscription_deleted_downgrades() {
        let body = payload(EVENT_SUBSCRIPTION_DELETED, json!({ "customer": "cus_1" }));
        let update = BillingEvent::parse(&body).unwrap().entitlement_update().unwrap();
        assert_eq!(update.key, EntitlementKey::Customer("cus_1".into()));
        assert_eq!(update.tier, SubscriptionTier::Free);
        assert_eq!(update.subscription_id, SubscriptionIdChange::Clear);
    }

    #[test]
    fn subscription_updated_maps_status() {
        for (status, tier) in [
            ("active", SubscriptionTier::Premium),
            ("past_due", SubscriptionTier::Free),
            ("canceled", SubscriptionTier::Free),
        ] {
            let body = payload(
                EVENT_SUBSCRIPTION_UPDATED,
                json!({ "customer": "cus_1", "status": status }),
            );
            let update = BillingEvent::parse(&body).unwrap().entitlement_update().unwrap();
            assert_eq!(update.tier, tier, "status {status}");
            assert_eq!(update.subscription_id, SubscriptionIdChange::Keep);
        }
    }

    #[test]
    fn unknown_types_are_ignored() {
        let body = payload("invoice.paid", json!({ "customer": "cus_1" }));
        let event = BillingEvent::parse(&body).unwrap();
        assert_eq!(event.kind, BillingEventKind::Ignored);
        assert!(event.entitlement_update().is_none());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_matches!(BillingEvent::parse(b"not json"), Err(CoreError::Validation(_)));
        let body = payload(EVENT_SUBSCRIPTION_DELETED, json!({}));
        assert_matches!(BillingEvent::parse(&body), Err(CoreError::Validation(_)));
        let body = payload(EVENT_SUBSCRIPTION_UPDATED, json!({ "customer": "cus_1" }));
        assert_matches!(BillingEvent::parse(&body), Err(CoreError::Validation(_)));
    }
}
