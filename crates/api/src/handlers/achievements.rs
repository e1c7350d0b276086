//! Handlers for achievements.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use skinscan_core::achievement::{Achievement, AwardAchievementRequest, AwardOutcome};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Tri-state award response. Both outcomes answer 200.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<Achievement>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_unlocked: Option<bool>,
}

/// POST /api/v1/achievements
pub async fn award_achievement(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AwardAchievementRequest>,
) -> AppResult<Json<AwardResponse>> {
    input.validate_input()?;

    let outcome = state
        .achievements
        .award(user.user_id, &input, Utc::now())
        .await?;

    let response = match outcome {
        AwardOutcome::Awarded(achievement) => {
            tracing::info!(
                user_id = %user.user_id,
                achievement = %achievement.achievement_name,
                "Achievement unlocked",
            );
            AwardResponse {
                success: true,
                message: format!("Achievement unlocked: {}", achievement.achievement_name),
                achievement: Some(achievement),
                already_unlocked: None,
            }
        }
        AwardOutcome::AlreadyUnlocked => AwardResponse {
            success: false,
            achievement: None,
            message: "Achievement already unlocked".to_string(),
            already_unlocked: Some(true),
        },
    };

    Ok(Json(response))
}

/// GET /api/v1/achievements
pub async fn list_achievements(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Achievement>>>> {
    let achievements = state.achievements.list_for_user(user.user_id).await?;
    Ok(Json(DataResponse { data: achievements }))
}
