use std::sync::Arc;

use papergraph_common::{
    AnalysisResult, AnalysisTask, EventType, NewActivity, Page, PaperGraphError, Result,
    TargetType, TaskCompletion, TaskId, TaskStatus, UserId,
};
use papergraph_store::Store;
use serde_json::json;
use tracing::{info, warn};

use super::document::AnalysisDocument;
use crate::badges::BadgeEngine;

/// How many in-progress analyses `get_active_tasks` reports.
pub const MAX_ACTIVE_TASKS: i64 = 2;

/// Analysis task lifecycle: `in_progress -> completed | failed`, plus an
/// owner-controlled public flag.
#[derive(Clone)]
pub struct AnalysisTasks {
    store: Arc<dyn Store>,
    badges: BadgeEngine,
}

impl AnalysisTasks {
    pub fn new(store: Arc<dyn Store>, badges: BadgeEngine) -> Self {
        Self { store, badges }
    }

    pub async fn create(&self, user_id: UserId, paper_id: i64) -> Result<AnalysisTask> {
        let task = self.store.create_task(user_id, paper_id).await?;
        info!(task_id = task.id, user_id, paper_id, "analysis task created");
        Ok(task)
    }

    pub async fn get(&self, task_id: TaskId) -> Result<AnalysisTask> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("task", task_id))
    }

    pub async fn get_result(&self, task_id: TaskId) -> Result<Option<AnalysisResult>> {
        self.store.find_result(task_id).await
    }

    /// Store the document, count the analysis, log it and re-evaluate badges.
    pub async fn complete(
        &self,
        task_id: TaskId,
        document: &AnalysisDocument,
    ) -> Result<AnalysisTask> {
        document.validate()?;
        let task = self.get(task_id).await?;

        let completion = TaskCompletion {
            task_id,
            content: document.to_value()?,
            suggest_score: document.suggestion_strength(),
            activity: NewActivity::new(
                task.user_id,
                EventType::AnalysisCompleted,
                TargetType::Task,
                task_id,
            )
            .with_title(document.basic_info.title.clone())
            .with_content(document.summary.conclusion.clone())
            .with_metadata(json!({ "paper_id": task.paper_id })),
        };

        let task = self.store.complete_task(completion).await?;
        info!(
            task_id,
            user_id = task.user_id,
            suggest_score = task.suggest_score,
            "analysis task completed"
        );
        self.badges.evaluate_logged(task.user_id).await;
        Ok(task)
    }

    pub async fn fail(&self, task_id: TaskId) -> Result<AnalysisTask> {
        let task = self.store.fail_task(task_id).await?;
        warn!(task_id, user_id = task.user_id, "analysis task failed");
        Ok(task)
    }

    /// Only the owner may change visibility.
    pub async fn set_public(
        &self,
        user_id: UserId,
        task_id: TaskId,
        is_public: bool,
    ) -> Result<AnalysisTask> {
        let task = self.get(task_id).await?;
        if task.user_id != user_id {
            return Err(PaperGraphError::Forbidden(format!(
                "task {task_id} belongs to another user"
            )));
        }

        let task = self.store.set_task_public(task_id, is_public).await?;
        info!(task_id, user_id, is_public, "task visibility changed");
        if task.status == TaskStatus::Completed && is_public {
            self.badges.evaluate_logged(user_id).await;
        }
        Ok(task)
    }

    /// Newest first.
    pub async fn get_user_tasks(&self, user_id: UserId, page: Page) -> Result<Vec<AnalysisTask>> {
        self.store.list_user_tasks(user_id, None, page).await
    }

    /// At most two in-progress tasks, newest first.
    pub async fn get_active_tasks(&self, user_id: UserId) -> Result<Vec<AnalysisTask>> {
        self.store
            .list_user_tasks(
                user_id,
                Some(TaskStatus::InProgress),
                Page::new(MAX_ACTIVE_TASKS, 0),
            )
            .await
    }
}
