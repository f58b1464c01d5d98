use std::sync::Arc;

use papergraph_common::{
    Comment, CommentId, EventType, NewActivity, NewComment, PaperGraphError, Result, TargetType,
    TaskId, UserId,
};
use papergraph_store::Store;
use serde_json::json;
use tracing::info;

use crate::badges::BadgeEngine;

/// Free-text comments on analysis tasks, optionally threaded.
#[derive(Clone)]
pub struct Comments {
    store: Arc<dyn Store>,
    badges: BadgeEngine,
}

impl Comments {
    pub fn new(store: Arc<dyn Store>, badges: BadgeEngine) -> Self {
        Self { store, badges }
    }

    pub async fn add(
        &self,
        user_id: UserId,
        task_id: TaskId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PaperGraphError::validation("comment content is required"));
        }
        if self.store.find_task(task_id).await?.is_none() {
            return Err(PaperGraphError::not_found("task", task_id));
        }
        if let Some(parent_id) = parent_id {
            let parent = self.store.find_comment(parent_id).await?;
            if parent.map_or(true, |p| p.task_id != task_id) {
                return Err(PaperGraphError::not_found("comment", parent_id));
            }
        }

        let event_type = if parent_id.is_some() {
            EventType::CommentReplied
        } else {
            EventType::CommentCreated
        };
        // target_id is replaced with the new comment id by the store.
        let activity = NewActivity::new(user_id, event_type, TargetType::Comment, 0)
            .with_content(content)
            .with_metadata(json!({ "task_id": task_id, "parent_id": parent_id }));

        let comment = self
            .store
            .insert_comment(
                NewComment {
                    task_id,
                    user_id,
                    content: content.to_string(),
                    parent_id,
                },
                activity,
            )
            .await?;

        info!(comment_id = comment.id, task_id, user_id, "comment added");
        self.badges.evaluate_logged(user_id).await;
        Ok(comment)
    }

    /// Oldest first.
    pub async fn list(&self, task_id: TaskId) -> Result<Vec<Comment>> {
        self.store.list_comments(task_id).await
    }
}
