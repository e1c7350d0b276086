//! SkinScan domain rules.
//!
//! This crate has zero internal deps so the API server, the repositories
//! and the client library all share one definition of the scan model, the
//! scoring formula, the free-tier cooldown and the subscription tier
//! transitions.

pub mod achievement;
pub mod billing;
pub mod eligibility;
pub mod entitlement;
pub mod error;
pub mod progress;
pub mod scan;
pub mod scoring;
pub mod signature;
pub mod types;
