use async_trait::async_trait;
use papergraph_common::{Result, StatField, UserId, UserStats};

use super::{apply_delta, PgStore, STATS_COLUMNS};
use crate::traits::StatsRepository;

#[async_trait]
impl StatsRepository for PgStore {
    async fn get_or_create_stats(&self, user_id: UserId) -> Result<UserStats> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM user_stats WHERE user_id = $1 AND deleted_at IS NULL"
        );
        if let Some(stats) = sqlx::query_as::<_, UserStats>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(stats);
        }

        // Missing or tombstoned: create, or revive with counters intact.
        let sql = format!(
            r#"
            INSERT INTO user_stats (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE
                SET deleted_at = NULL,
                    updated_at = now()
            RETURNING {STATS_COLUMNS}
            "#
        );
        let stats = sqlx::query_as::<_, UserStats>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(user_id, "user stats row created");
        Ok(stats)
    }

    async fn apply_stat_delta(
        &self,
        user_id: UserId,
        field: StatField,
        delta: i64,
    ) -> Result<UserStats> {
        apply_delta(&self.pool, user_id, field, delta).await
    }

    async fn tombstone_stats(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_stats
            SET deleted_at = now(), updated_at = now()
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats_user_ids(&self) -> Result<Vec<UserId>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT user_id FROM user_stats WHERE deleted_at IS NULL ORDER BY user_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
