use skinscan_core::achievement::Achievement;
use skinscan_core::types::{DbId, Timestamp, UserId};
use sqlx::FromRow;

/// A row from the `achievements` table.
#[derive(Debug, Clone, FromRow)]
pub struct AchievementRow {
    pub id: DbId,
    pub user_id: UserId,
    pub achievement_type: String,
    pub achievement_name: String,
    pub achievement_description: String,
    pub progress: i32,
    pub unlocked_at: Timestamp,
}

impl From<AchievementRow> for Achievement {
    fn from(row: AchievementRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            achievement_type: row.achievement_type,
            achievement_name: row.achievement_name,
            achievement_description: row.achievement_description,
            progress: row.progress,
            unlocked_at: row.unlocked_at,
        }
    }
}
