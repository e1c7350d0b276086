use crate::types::Timestamp;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The caller has no scan allowance right now. `next_available_at` is
    /// set when the denial is a running cooldown.
    #[error("Rate limited: {message}")]
    RateLimited {
        error: &'static str,
        message: String,
        next_available_at: Option<Timestamp>,
        retry_after_secs: Option<i64>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
