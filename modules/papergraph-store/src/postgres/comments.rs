use async_trait::async_trait;
use papergraph_common::{
    Comment, CommentId, NewActivity, NewComment, PaperGraphError, Result, StatField, TaskId,
};

use super::{apply_delta, insert_activity, PgStore};
use crate::traits::CommentRepository;

const COMMENT_COLUMNS: &str = "id, task_id, user_id, content, parent_id, created_at, deleted_at";

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert_comment(&self, comment: NewComment, activity: NewActivity) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        // Replies attach to a live comment on the same task.
        if let Some(parent_id) = comment.parent_id {
            let parent = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT id FROM comments
                WHERE id = $1 AND task_id = $2 AND deleted_at IS NULL
                FOR SHARE
                "#,
            )
            .bind(parent_id)
            .bind(comment.task_id)
            .fetch_optional(&mut *tx)
            .await?;
            if parent.is_none() {
                return Err(PaperGraphError::not_found("comment", parent_id));
            }
        }

        let sql = format!(
            r#"
            INSERT INTO comments (task_id, user_id, content, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Comment>(&sql)
            .bind(comment.task_id)
            .bind(comment.user_id)
            .bind(&comment.content)
            .bind(comment.parent_id)
            .fetch_one(&mut *tx)
            .await?;

        apply_delta(&mut *tx, comment.user_id, StatField::CommentCount, 1).await?;
        let activity = NewActivity {
            target_id: created.id,
            ..activity
        };
        insert_activity(&mut *tx, &activity).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list_comments(&self, task_id: TaskId) -> Result<Vec<Comment>> {
        let sql = format!(
            r#"
            SELECT {COMMENT_COLUMNS} FROM comments
            WHERE task_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }
}
