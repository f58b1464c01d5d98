use std::collections::BTreeMap;

use async_trait::async_trait;
use papergraph_common::{
    ReactionToggle, ReactionType, Result, TaskId, TaskReaction, UserId,
};

use super::{apply_delta, insert_activity, PgStore};
use crate::traits::{ReactionChange, ReactionRepository};

const REACTION_COLUMNS: &str = "id, task_id, user_id, reaction_type, created_at, deleted_at";

#[async_trait]
impl ReactionRepository for PgStore {
    async fn find_reaction(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Result<Option<TaskReaction>> {
        let sql = format!(
            r#"
            SELECT {REACTION_COLUMNS} FROM task_reactions
            WHERE user_id = $1 AND task_id = $2 AND reaction_type = $3 AND deleted_at IS NULL
            "#
        );
        sqlx::query_as::<_, TaskReaction>(&sql)
            .bind(user_id)
            .bind(task_id)
            .bind(reaction_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn toggle_reaction(&self, change: ReactionChange) -> Result<ReactionToggle> {
        let mut tx = self.pool.begin().await?;

        // Toggle off: tombstone the live row.
        let sql = format!(
            r#"
            UPDATE task_reactions
            SET deleted_at = now()
            WHERE user_id = $1 AND task_id = $2 AND reaction_type = $3 AND deleted_at IS NULL
            RETURNING {REACTION_COLUMNS}
            "#
        );
        let removed = sqlx::query_as::<_, TaskReaction>(&sql)
            .bind(change.user_id)
            .bind(change.task_id)
            .bind(change.reaction_type.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let (toggle, activity, delta) = match removed {
            Some(reaction) => (ReactionToggle::Removed(reaction), &change.on_remove, -1),
            None => {
                let sql = format!(
                    r#"
                    INSERT INTO task_reactions (task_id, user_id, reaction_type)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, task_id, reaction_type) WHERE deleted_at IS NULL
                    DO NOTHING
                    RETURNING {REACTION_COLUMNS}
                    "#
                );
                let inserted = sqlx::query_as::<_, TaskReaction>(&sql)
                    .bind(change.task_id)
                    .bind(change.user_id)
                    .bind(change.reaction_type.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;

                match inserted {
                    Some(reaction) => (ReactionToggle::Added(reaction), &change.on_add, 1),
                    None => {
                        // A concurrent identical reaction committed first.
                        drop(tx);
                        let existing = self
                            .find_reaction(change.user_id, change.task_id, change.reaction_type)
                            .await?
                            .ok_or_else(|| {
                                papergraph_common::PaperGraphError::Database(
                                    "reaction vanished during concurrent toggle".to_string(),
                                )
                            })?;
                        tracing::debug!(
                            user_id = change.user_id,
                            task_id = change.task_id,
                            reaction = %change.reaction_type,
                            "reaction already present, treating as reacted"
                        );
                        return Ok(ReactionToggle::Added(existing));
                    }
                }
            }
        };

        insert_activity(&mut *tx, activity).await?;

        if let Some((credited, field)) = change.credit {
            apply_delta(&mut *tx, credited, field, delta).await?;
        }

        if change.adjust_task_likes {
            sqlx::query(
                "UPDATE analysis_tasks SET like_count = GREATEST(like_count + $2, 0) WHERE id = $1",
            )
            .bind(change.task_id)
            .bind(delta)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(toggle)
    }

    async fn reaction_counts(&self, task_id: TaskId) -> Result<BTreeMap<ReactionType, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT reaction_type, COUNT(*) FROM task_reactions
            WHERE task_id = $1 AND deleted_at IS NULL
            GROUP BY reaction_type
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(ty, n)| Ok((ty.parse::<ReactionType>()?, n)))
            .collect()
    }
}
