pub mod achievement;
pub mod billing_event;
pub mod entitlement;
