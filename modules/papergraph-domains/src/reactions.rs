use std::collections::BTreeMap;
use std::sync::Arc;

use papergraph_common::{
    EventType, NewActivity, PaperGraphError, ReactionToggle, ReactionType, Result, StatField,
    TargetType, TaskId, TaskReaction, UserId,
};
use papergraph_store::{ReactionChange, Store};
use serde_json::json;
use tracing::info;

use crate::badges::BadgeEngine;

/// Toggleable typed reactions on analysis tasks.
#[derive(Clone)]
pub struct ReactionLedger {
    store: Arc<dyn Store>,
    badges: BadgeEngine,
}

impl ReactionLedger {
    pub fn new(store: Arc<dyn Store>, badges: BadgeEngine) -> Self {
        Self { store, badges }
    }

    /// Parse the reaction type first so an unknown value is rejected before
    /// anything is read or written.
    pub async fn react(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: &str,
    ) -> Result<ReactionToggle> {
        let reaction_type: ReactionType = reaction_type.parse()?;
        self.toggle(user_id, task_id, reaction_type).await
    }

    /// Add the reaction, or remove it when the user already has one of this
    /// type on the task.
    pub async fn toggle(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Result<ReactionToggle> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("task", task_id))?;

        // Likes are received by the task owner; shares are made by the reactor.
        let credit = match reaction_type.stat_field() {
            Some(StatField::LikeCount) => Some((task.user_id, StatField::LikeCount)),
            Some(field) => Some((user_id, field)),
            None => None,
        };

        let metadata = json!({ "reaction_type": reaction_type, "task_owner": task.user_id });
        let change = ReactionChange {
            user_id,
            task_id,
            reaction_type,
            credit,
            adjust_task_likes: reaction_type == ReactionType::Like,
            on_add: NewActivity::new(user_id, EventType::React, TargetType::Task, task_id)
                .with_title(reaction_type.describe(false))
                .with_metadata(metadata.clone()),
            on_remove: NewActivity::new(user_id, EventType::Unreact, TargetType::Task, task_id)
                .with_title(reaction_type.describe(true))
                .with_metadata(metadata),
        };

        let toggle = self.store.toggle_reaction(change).await?;
        info!(
            user_id,
            task_id,
            reaction = %reaction_type,
            active = toggle.is_active(),
            "reaction toggled"
        );

        if let Some((credited, _)) = credit {
            self.badges.evaluate_logged(credited).await;
        }
        Ok(toggle)
    }

    /// Active reactions on a task, counted per type.
    pub async fn get_task_reactions(&self, task_id: TaskId) -> Result<BTreeMap<ReactionType, i64>> {
        self.store.reaction_counts(task_id).await
    }

    pub async fn get_user_reaction(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Result<Option<TaskReaction>> {
        self.store
            .find_reaction(user_id, task_id, reaction_type)
            .await
    }
}
