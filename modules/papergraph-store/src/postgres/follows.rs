use async_trait::async_trait;
use papergraph_common::{NewActivity, Page, Result, StatField, UserFollow, UserId};

use super::{apply_delta, insert_activity, PgStore};
use crate::traits::FollowRepository;

const FOLLOW_COLUMNS: &str = "id, follower_id, following_id, created_at, deleted_at";

#[async_trait]
impl FollowRepository for PgStore {
    async fn insert_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: NewActivity,
    ) -> Result<Option<UserFollow>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO user_follows (follower_id, following_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, following_id) WHERE deleted_at IS NULL DO NOTHING
            RETURNING {FOLLOW_COLUMNS}
            "#
        );
        let edge = sqlx::query_as::<_, UserFollow>(&sql)
            .bind(follower_id)
            .bind(following_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(edge) = edge else {
            return Ok(None);
        };

        insert_activity(&mut *tx, &activity).await?;
        apply_delta(&mut *tx, follower_id, StatField::FollowingCount, 1).await?;
        apply_delta(&mut *tx, following_id, StatField::FollowerCount, 1).await?;

        tx.commit().await?;
        Ok(Some(edge))
    }

    async fn remove_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: Option<NewActivity>,
    ) -> Result<Option<UserFollow>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE user_follows
            SET deleted_at = now()
            WHERE follower_id = $1 AND following_id = $2 AND deleted_at IS NULL
            RETURNING {FOLLOW_COLUMNS}
            "#
        );
        let edge = sqlx::query_as::<_, UserFollow>(&sql)
            .bind(follower_id)
            .bind(following_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(edge) = edge else {
            return Ok(None);
        };

        if let Some(activity) = &activity {
            insert_activity(&mut *tx, activity).await?;
        }
        apply_delta(&mut *tx, follower_id, StatField::FollowingCount, -1).await?;
        apply_delta(&mut *tx, following_id, StatField::FollowerCount, -1).await?;

        tx.commit().await?;
        Ok(Some(edge))
    }

    async fn is_following(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_follows
                WHERE follower_id = $1 AND following_id = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn list_following(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        let sql = format!(
            r#"
            SELECT {FOLLOW_COLUMNS} FROM user_follows
            WHERE follower_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, UserFollow>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list_followers(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        let sql = format!(
            r#"
            SELECT {FOLLOW_COLUMNS} FROM user_follows
            WHERE following_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, UserFollow>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn following_ids(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT following_id FROM user_follows
            WHERE follower_id = $1 AND deleted_at IS NULL
            ORDER BY following_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
