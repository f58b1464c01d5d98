use async_trait::async_trait;
use papergraph_common::{
    AnalysisResult, AnalysisTask, Author, FeedAnalysis, FeedOrder, Page, PaperGraphError, Result,
    StatField, TaskCompletion, TaskId, TaskStatus, UserId,
};

use super::{apply_delta, insert_activity, PgStore};
use crate::traits::TaskRepository;

const TASK_COLUMNS: &str = "id, user_id, paper_id, status, is_public, suggest_score, like_count, \
     read_count, created_at, finished_at, deleted_at";

const FEED_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.paper_id, t.status, t.is_public, t.suggest_score, t.like_count,
           t.read_count, t.created_at, t.finished_at, t.deleted_at,
           u.id AS author_id, u.name AS author_name, u.avatar AS author_avatar
    FROM analysis_tasks t
    LEFT JOIN users u ON u.id = t.user_id AND u.deleted_at IS NULL
    WHERE t.deleted_at IS NULL AND t.is_public AND t.status = 'completed'
"#;

#[derive(sqlx::FromRow)]
struct FeedAnalysisRow {
    #[sqlx(flatten)]
    task: AnalysisTask,
    author_id: Option<i64>,
    author_name: Option<String>,
    author_avatar: Option<String>,
}

impl From<FeedAnalysisRow> for FeedAnalysis {
    fn from(row: FeedAnalysisRow) -> Self {
        let author = row.author_id.map(|id| Author {
            id,
            name: row.author_name.unwrap_or_default(),
            avatar: row.author_avatar,
        });
        FeedAnalysis {
            task: row.task,
            author,
        }
    }
}

impl PgStore {
    /// Explain why a guarded state transition matched no row.
    async fn transition_error(&self, task_id: TaskId, to: TaskStatus) -> PaperGraphError {
        match self.find_task(task_id).await {
            Ok(Some(task)) => PaperGraphError::validation(format!(
                "task {task_id} is {}, cannot move to {to}",
                task.status
            )),
            Ok(None) => PaperGraphError::not_found("task", task_id),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl TaskRepository for PgStore {
    async fn create_task(&self, user_id: UserId, paper_id: i64) -> Result<AnalysisTask> {
        let sql = format!(
            r#"
            INSERT INTO analysis_tasks (user_id, paper_id, status)
            VALUES ($1, $2, 'in_progress')
            RETURNING {TASK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(user_id)
            .bind(paper_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_task(&self, task_id: TaskId) -> Result<Option<AnalysisTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM analysis_tasks WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn complete_task(&self, completion: TaskCompletion) -> Result<AnalysisTask> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE analysis_tasks
            SET status = 'completed', finished_at = now(), suggest_score = $2
            WHERE id = $1 AND status = 'in_progress' AND deleted_at IS NULL
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(completion.task_id)
            .bind(completion.suggest_score)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(task) = task else {
            drop(tx);
            return Err(self
                .transition_error(completion.task_id, TaskStatus::Completed)
                .await);
        };

        sqlx::query("INSERT INTO analysis_results (task_id, content) VALUES ($1, $2)")
            .bind(task.id)
            .bind(&completion.content)
            .execute(&mut *tx)
            .await?;

        apply_delta(&mut *tx, task.user_id, StatField::AnalysisCount, 1).await?;
        if task.is_public {
            apply_delta(&mut *tx, task.user_id, StatField::PublicAnalysisCount, 1).await?;
        }
        insert_activity(&mut *tx, &completion.activity).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn fail_task(&self, task_id: TaskId) -> Result<AnalysisTask> {
        let sql = format!(
            r#"
            UPDATE analysis_tasks
            SET status = 'failed', finished_at = now()
            WHERE id = $1 AND status = 'in_progress' AND deleted_at IS NULL
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        match task {
            Some(task) => Ok(task),
            None => Err(self.transition_error(task_id, TaskStatus::Failed).await),
        }
    }

    async fn set_task_public(&self, task_id: TaskId, is_public: bool) -> Result<AnalysisTask> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so the flag flip and the counter move together.
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM analysis_tasks \
             WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        let before = sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("task", task_id))?;

        if before.is_public == is_public {
            return Ok(before);
        }

        let sql = format!(
            "UPDATE analysis_tasks SET is_public = $2 WHERE id = $1 RETURNING {TASK_COLUMNS}"
        );
        let task = sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(task_id)
            .bind(is_public)
            .fetch_one(&mut *tx)
            .await?;

        if task.status == TaskStatus::Completed {
            let delta = if is_public { 1 } else { -1 };
            apply_delta(&mut *tx, task.user_id, StatField::PublicAnalysisCount, delta).await?;
        }

        tx.commit().await?;
        Ok(task)
    }

    async fn find_result(&self, task_id: TaskId) -> Result<Option<AnalysisResult>> {
        sqlx::query_as::<_, AnalysisResult>(
            "SELECT id, task_id, content, created_at FROM analysis_results WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn list_user_tasks(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        page: Page,
    ) -> Result<Vec<AnalysisTask>> {
        let sql = format!(
            r#"
            SELECT {TASK_COLUMNS} FROM analysis_tasks
            WHERE user_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        );
        sqlx::query_as::<_, AnalysisTask>(&sql)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn analysis_feed(&self, audience: &[UserId], page: Page) -> Result<Vec<FeedAnalysis>> {
        let sql = format!(
            r#"
            {FEED_SELECT}
              AND t.user_id = ANY($1)
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, FeedAnalysisRow>(&sql)
            .bind(audience)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn public_feed(&self, order: FeedOrder, page: Page) -> Result<Vec<FeedAnalysis>> {
        let order_by = match order {
            FeedOrder::Likes => "t.like_count DESC, t.finished_at DESC NULLS LAST, t.id DESC",
            FeedOrder::Suggestion => {
                "t.suggest_score DESC, t.finished_at DESC NULLS LAST, t.id DESC"
            }
            FeedOrder::Recent => "t.finished_at DESC NULLS LAST, t.id DESC",
        };
        let sql = format!("{FEED_SELECT} ORDER BY {order_by} LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, FeedAnalysisRow>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
