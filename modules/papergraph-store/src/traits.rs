//! Repository traits, one per component.
//!
//! Implemented by `PgStore` (postgres) and `MemoryStore` (tests, local runs).
//! Methods that touch more than one row are units of work: the implementation
//! applies every write or none of them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use papergraph_common::{
    ActivityFilter, ActivityStats, AnalysisResult, AnalysisTask, Author, BadgeTemplate, Comment,
    CommentId, EvaluationDetail, EvaluationId, EvaluationLikeToggle, EvaluationStatistics,
    EvaluationUpdate, FeedActivity, FeedAnalysis, FeedOrder, NewActivity, NewBadgeTemplate,
    NewComment, NewEvaluation, Page, PaperEvaluation, ReactionToggle, ReactionType, Result,
    StatField, TaskCompletion, TaskId, TaskReaction, TaskStatus, UserActivity, UserBadge,
    UserFollow, UserId, UserStats,
};

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Existing live row, or a fresh zero-valued one. A tombstoned row is
    /// revived with its counters intact.
    async fn get_or_create_stats(&self, user_id: UserId) -> Result<UserStats>;

    /// Additive single-column update, floored at zero. Creates the row if
    /// missing. Concurrent deltas commute.
    async fn apply_stat_delta(
        &self,
        user_id: UserId,
        field: StatField,
        delta: i64,
    ) -> Result<UserStats>;

    /// Soft-delete. Returns false when there was no live row.
    async fn tombstone_stats(&self, user_id: UserId) -> Result<bool>;

    /// Every user with a live stats row, ascending.
    async fn stats_user_ids(&self) -> Result<Vec<UserId>>;
}

#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Insert templates whose type is not yet present. Returns how many were inserted.
    async fn seed_badge_templates(&self, templates: &[NewBadgeTemplate]) -> Result<usize>;

    async fn list_badge_templates(&self) -> Result<Vec<BadgeTemplate>>;

    async fn find_badge_template(&self, badge_type: &str) -> Result<Option<BadgeTemplate>>;

    async fn find_user_badge(&self, user_id: UserId, badge_type: &str)
        -> Result<Option<UserBadge>>;

    /// Snapshot `template` into a new UserBadge and append `activity` with its
    /// `target_id` set to the new badge id, atomically. `None` when the user
    /// already holds this badge type.
    async fn award_badge(
        &self,
        user_id: UserId,
        template: &BadgeTemplate,
        activity: NewActivity,
    ) -> Result<Option<UserBadge>>;

    /// Newest first.
    async fn list_user_badges(&self, user_id: UserId) -> Result<Vec<UserBadge>>;
}

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the edge, append `activity`, bump the follower's following_count
    /// and the followee's follower_count in one unit. `None` when a live edge
    /// already exists (nothing is written).
    async fn insert_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: NewActivity,
    ) -> Result<Option<UserFollow>>;

    /// Tombstone the live edge and decrement both counters (floored) in one
    /// unit, appending `activity` if given. `None` when there is no live edge.
    async fn remove_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: Option<NewActivity>,
    ) -> Result<Option<UserFollow>>;

    async fn is_following(&self, follower_id: UserId, following_id: UserId) -> Result<bool>;

    /// Edges where `user_id` is the follower, newest first.
    async fn list_following(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>>;

    /// Edges where `user_id` is followed, newest first.
    async fn list_followers(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>>;

    async fn following_ids(&self, user_id: UserId) -> Result<Vec<UserId>>;
}

/// A reaction toggle request with everything either direction writes.
#[derive(Debug, Clone)]
pub struct ReactionChange {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub reaction_type: ReactionType,
    /// Stats counter credited (+1 on add, -1 on remove) and to whom.
    pub credit: Option<(UserId, StatField)>,
    /// Move the task's own like_count along with the reaction.
    pub adjust_task_likes: bool,
    pub on_add: NewActivity,
    pub on_remove: NewActivity,
}

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn find_reaction(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Result<Option<TaskReaction>>;

    /// Remove the live reaction if present, otherwise add it, along with the
    /// activity, credit and task-like writes for that direction, atomically.
    /// Losing an insert race to an identical concurrent reaction counts as
    /// "already reacted": the existing row is returned as `Added` and nothing
    /// else is written.
    async fn toggle_reaction(&self, change: ReactionChange) -> Result<ReactionToggle>;

    /// Live reactions on a task, counted per type.
    async fn reaction_counts(&self, task_id: TaskId) -> Result<BTreeMap<ReactionType, i64>>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append_activity(&self, activity: NewActivity) -> Result<UserActivity>;

    async fn find_activity(&self, id: i64) -> Result<Option<FeedActivity>>;

    /// Filtered listing, newest first, with the total matching count.
    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<(Vec<FeedActivity>, i64)>;

    /// Soft-delete an activity owned by `user_id`. False when absent or not owned.
    async fn tombstone_activity(&self, id: i64, user_id: UserId) -> Result<bool>;

    async fn activity_stats(&self, user_id: UserId, since: DateTime<Utc>) -> Result<ActivityStats>;

    /// Activities authored by `audience`, newest first. `viewer` sees all of
    /// their own; others' are visible when public, or friends-only and the
    /// author follows the viewer back.
    async fn activity_feed(
        &self,
        viewer: UserId,
        audience: &[UserId],
        page: Page,
    ) -> Result<Vec<FeedActivity>>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create_task(&self, user_id: UserId, paper_id: i64) -> Result<AnalysisTask>;

    async fn find_task(&self, task_id: TaskId) -> Result<Option<AnalysisTask>>;

    /// in_progress -> completed: stores the result, stamps finished_at, bumps
    /// the owner's analysis counters and appends the activity in one unit.
    /// A task in any other state is a validation error.
    async fn complete_task(&self, completion: TaskCompletion) -> Result<AnalysisTask>;

    /// in_progress -> failed.
    async fn fail_task(&self, task_id: TaskId) -> Result<AnalysisTask>;

    /// Flip the public flag. When a completed task actually changes state the
    /// owner's public_analysis_count follows in the same unit.
    async fn set_task_public(&self, task_id: TaskId, is_public: bool) -> Result<AnalysisTask>;

    async fn find_result(&self, task_id: TaskId) -> Result<Option<AnalysisResult>>;

    /// Newest first, optionally restricted to one status.
    async fn list_user_tasks(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        page: Page,
    ) -> Result<Vec<AnalysisTask>>;

    /// Public, completed tasks authored by `audience`, newest first.
    async fn analysis_feed(&self, audience: &[UserId], page: Page) -> Result<Vec<FeedAnalysis>>;

    /// All public, completed tasks in the requested order.
    async fn public_feed(&self, order: FeedOrder, page: Page) -> Result<Vec<FeedAnalysis>>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert the comment, bump the author's comment_count and append
    /// `activity` (target set to the new comment id) in one unit.
    async fn insert_comment(&self, comment: NewComment, activity: NewActivity) -> Result<Comment>;

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>>;

    /// Oldest first.
    async fn list_comments(&self, task_id: TaskId) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait EvaluationRepository: Send + Sync {
    /// Insert the evaluation with its dimensions and metrics and append
    /// `activity` (target set to the new evaluation id) in one unit.
    async fn insert_evaluation(
        &self,
        evaluation: NewEvaluation,
        activity: NewActivity,
    ) -> Result<EvaluationDetail>;

    async fn find_evaluation(&self, id: EvaluationId) -> Result<Option<EvaluationDetail>>;

    /// The newest live evaluation attached to an analysis task.
    async fn find_evaluation_by_analysis(
        &self,
        analysis_id: TaskId,
    ) -> Result<Option<EvaluationDetail>>;

    /// Overwrite the editable fields and append `activity` in one unit.
    async fn update_evaluation(
        &self,
        id: EvaluationId,
        update: EvaluationUpdate,
        activity: NewActivity,
    ) -> Result<PaperEvaluation>;

    /// Soft-delete. False when there was no live row.
    async fn tombstone_evaluation(&self, id: EvaluationId) -> Result<bool>;

    /// Unlike when a live like exists, otherwise like and append `on_like`.
    /// like_count moves with the row and never goes below zero. Losing an
    /// insert race to an identical like reads as liked.
    async fn toggle_evaluation_like(
        &self,
        evaluation_id: EvaluationId,
        user_id: UserId,
        on_like: NewActivity,
    ) -> Result<EvaluationLikeToggle>;

    /// Public evaluations of a paper, best score first, with the total.
    async fn list_paper_evaluations(
        &self,
        paper_id: i64,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)>;

    /// Every evaluation by `user_id`, newest first, with the total.
    async fn list_user_evaluations(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)>;

    /// Public evaluations by score, then likes.
    async fn top_evaluations(&self, limit: i64) -> Result<Vec<PaperEvaluation>>;

    /// Public evaluations whose summary, recommendation, or any dimension
    /// description or evidence contains `query`, case-insensitively.
    async fn search_evaluations(
        &self,
        query: &str,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)>;

    async fn evaluation_statistics(&self, paper_id: i64) -> Result<EvaluationStatistics>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert_user(&self, author: Author) -> Result<()>;

    async fn find_author(&self, user_id: UserId) -> Result<Option<Author>>;
}

/// Everything the domain services need from storage.
pub trait Store:
    StatsRepository
    + BadgeRepository
    + FollowRepository
    + ReactionRepository
    + ActivityRepository
    + TaskRepository
    + CommentRepository
    + EvaluationRepository
    + UserRepository
{
}

impl<T> Store for T where
    T: StatsRepository
        + BadgeRepository
        + FollowRepository
        + ReactionRepository
        + ActivityRepository
        + TaskRepository
        + CommentRepository
        + EvaluationRepository
        + UserRepository
{
}
