//! PostgreSQL store for the `achievements` table.

use async_trait::async_trait;
use skinscan_core::achievement::{
    Achievement, AwardAchievementRequest, AwardOutcome, COMPLETE_PROGRESS,
};
use skinscan_core::types::{Timestamp, UserId};

use super::AchievementRepository;
use crate::models::achievement::AchievementRow;
use crate::DbPool;

const COLUMNS: &str = "\
    id, user_id, achievement_type, achievement_name, achievement_description, \
    progress, unlocked_at";

pub struct PgAchievementRepo {
    pool: DbPool,
}

impl PgAchievementRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementRepository for PgAchievementRepo {
    async fn award(
        &self,
        user_id: UserId,
        input: &AwardAchievementRequest,
        now: Timestamp,
    ) -> Result<AwardOutcome, sqlx::Error> {
        let query = format!(
            "INSERT INTO achievements \
                (user_id, achievement_type, achievement_name, achievement_description, \
                 progress, unlocked_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_achievements_user_type_name DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AchievementRow>(&query)
            .bind(user_id)
            .bind(&input.achievement_type)
            .bind(&input.achievement_name)
            .bind(&input.achievement_description)
            .bind(COMPLETE_PROGRESS)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => AwardOutcome::Awarded(row.into()),
            None => AwardOutcome::AlreadyUnlocked,
        })
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Achievement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM achievements \
             WHERE user_id = $1 \
             ORDER BY unlocked_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, AchievementRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Achievement::from).collect())
    }
}
