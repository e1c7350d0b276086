//! Shared response envelope types for API handlers.
//!
//! Resource read-outs use a `{ "data": ... }` envelope. The analyze,
//! eligibility, webhook and award endpoints answer with their own flat
//! shapes because existing clients depend on them.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
