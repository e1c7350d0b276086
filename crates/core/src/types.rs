/// Users are identified by the identity provider's UUID subject.
pub type UserId = uuid::Uuid;

/// Server-side primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
