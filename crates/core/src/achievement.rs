//! Achievement award input and outcome types.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp, UserId};

/// Progress recorded for an awarded achievement.
pub const COMPLETE_PROGRESS: i32 = 100;

/// Body of `POST /achievements`. Type and name are capped at 100
/// characters, the description at 500.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AwardAchievementRequest {
    #[validate(length(min = 1, max = 100))]
    pub achievement_type: String,
    #[validate(length(min = 1, max = 100))]
    pub achievement_name: String,
    #[validate(length(min = 1, max = 500))]
    pub achievement_description: String,
}

impl AwardAchievementRequest {
    /// Check lengths and reject whitespace-only fields.
    pub fn validate_input(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid achievement: {e}")))?;

        for (field, value) in [
            ("achievementType", &self.achievement_type),
            ("achievementName", &self.achievement_name),
            ("achievementDescription", &self.achievement_description),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{field} must not be blank")));
            }
        }
        Ok(())
    }
}

/// An unlocked achievement, unique per (user, type, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: DbId,
    pub user_id: UserId,
    pub achievement_type: String,
    pub achievement_name: String,
    pub achievement_description: String,
    pub progress: i32,
    pub unlocked_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    Awarded(Achievement),
    AlreadyUnlocked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> AwardAchievementRequest {
        AwardAchievementRequest {
            achievement_type: "streak".into(),
            achievement_name: "First Scan".into(),
            achievement_description: "Completed your first skin scan".into(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate_input().is_ok());
    }

    #[test]
    fn empty_and_blank_fields_fail() {
        let mut empty = request();
        empty.achievement_name = String::new();
        assert_matches!(empty.validate_input(), Err(CoreError::Validation(_)));

        let mut blank = request();
        blank.achievement_type = "   ".into();
        assert_matches!(blank.validate_input(), Err(CoreError::Validation(msg)) if msg.contains("achievementType"));
    }

    #[test]
    fn overlong_fields_fail() {
        let mut long_name = request();
        long_name.achievement_name = "x".repeat(101);
        assert_matches!(long_name.validate_input(), Err(CoreError::Validation(_)));

        let mut long_description = request();
        long_description.achievement_description = "x".repeat(501);
        assert_matches!(long_description.validate_input(), Err(CoreError::Validation(_)));

        let mut at_limit = request();
        at_limit.achievement_description = "x".repeat(500);
        assert!(at_limit.validate_input().is_ok());
    }

    #[test]
    fn parses_camel_case_body() {
        let body = r#"{"achievementType":"t","achievementName":"n","achievementDescription":"d"}"#;
        let parsed: AwardAchievementRequest = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.achievement_name, "n");
    }
}
