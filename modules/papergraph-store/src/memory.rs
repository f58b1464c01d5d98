//! Every repository trait over in-process collections.
//!
//! Mirrors `PgStore` semantics: soft deletes, floored counters, one live
//! follow edge per pair and one live reaction per (user, task, type).
//! Units of work validate everything before the first mutation, so a failed
//! call leaves the state untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use papergraph_common::{
    ActivityFilter, ActivityStats, AnalysisResult, AnalysisTask, Author, BadgeTemplate, Comment,
    CommentId, DimensionDetail, EvaluationDetail, EvaluationDimension, EvaluationId,
    EvaluationLikeToggle, EvaluationMetric, EvaluationStatistics, EvaluationUpdate, FeedActivity,
    FeedAnalysis, FeedOrder, NewActivity, NewBadgeTemplate, NewComment, NewEvaluation, Page,
    PaperEvaluation, PaperGraphError, ReactionToggle, ReactionType, Result, ScoreBand, StatField,
    TaskCompletion, TaskId, TaskReaction, TaskStatus, UserActivity, UserBadge, UserFollow, UserId,
    UserStats, Visibility,
};

use crate::traits::{
    ActivityRepository, BadgeRepository, CommentRepository, EvaluationRepository,
    FollowRepository, ReactionChange, ReactionRepository, StatsRepository, TaskRepository,
    UserRepository,
};

struct EvaluationLike {
    evaluation_id: EvaluationId,
    user_id: UserId,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    last_tick: Option<DateTime<Utc>>,
    users: BTreeMap<UserId, Author>,
    stats: BTreeMap<UserId, UserStats>,
    templates: Vec<BadgeTemplate>,
    badges: Vec<UserBadge>,
    follows: Vec<UserFollow>,
    activities: Vec<UserActivity>,
    tasks: Vec<AnalysisTask>,
    results: Vec<AnalysisResult>,
    reactions: Vec<TaskReaction>,
    comments: Vec<Comment>,
    evaluations: Vec<PaperEvaluation>,
    dimensions: Vec<EvaluationDimension>,
    metrics: Vec<EvaluationMetric>,
    evaluation_likes: Vec<EvaluationLike>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so "newest first" is well defined even
    /// when writes land within the same clock reading.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(now);
        now
    }

    fn apply_delta(&mut self, user_id: UserId, field: StatField, delta: i64) -> UserStats {
        let now = self.tick();
        let stats = self
            .stats
            .entry(user_id)
            .or_insert_with(|| UserStats::zeroed(user_id, now));
        stats.apply(field, delta);
        stats.updated_at = now;
        stats.clone()
    }

    fn insert_activity(&mut self, activity: &NewActivity) -> UserActivity {
        let id = self.next_id();
        let now = self.tick();
        let row = UserActivity {
            id,
            user_id: activity.user_id,
            event_type: activity.event_type,
            target_type: activity.target_type,
            target_id: activity.target_id,
            title: activity.title.clone(),
            content: activity.content.clone(),
            metadata: activity.metadata.clone(),
            visibility: activity.visibility,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.activities.push(row.clone());
        row
    }

    fn author(&self, user_id: UserId) -> Option<Author> {
        self.users.get(&user_id).cloned()
    }

    fn feed_activity(&self, activity: &UserActivity) -> FeedActivity {
        FeedActivity {
            activity: activity.clone(),
            author: self.author(activity.user_id),
        }
    }

    fn feed_analysis(&self, task: &AnalysisTask) -> FeedAnalysis {
        FeedAnalysis {
            task: task.clone(),
            author: self.author(task.user_id),
        }
    }

    fn is_following(&self, follower_id: UserId, following_id: UserId) -> bool {
        self.follows.iter().any(|f| {
            f.follower_id == follower_id && f.following_id == following_id && f.deleted_at.is_none()
        })
    }

    fn live_task(&self, task_id: TaskId) -> Option<&AnalysisTask> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id && t.deleted_at.is_none())
    }

    fn live_task_index(&self, task_id: TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == task_id && t.deleted_at.is_none())
            .ok_or_else(|| PaperGraphError::not_found("task", task_id))
    }

    fn live_reaction_index(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Option<usize> {
        self.reactions.iter().position(|r| {
            r.user_id == user_id
                && r.task_id == task_id
                && r.reaction_type == reaction_type
                && r.deleted_at.is_none()
        })
    }
}

impl State {
    fn live_evaluation_index(&self, id: EvaluationId) -> Result<usize> {
        self.evaluations
            .iter()
            .position(|e| e.id == id && e.deleted_at.is_none())
            .ok_or_else(|| PaperGraphError::not_found("evaluation", id))
    }

    fn evaluation_detail(&self, evaluation: &PaperEvaluation) -> EvaluationDetail {
        let dimensions = self
            .dimensions
            .iter()
            .filter(|d| d.evaluation_id == evaluation.id)
            .map(|d| DimensionDetail {
                dimension: d.clone(),
                metrics: self
                    .metrics
                    .iter()
                    .filter(|m| m.dimension_id == d.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        EvaluationDetail {
            evaluation: evaluation.clone(),
            dimensions,
        }
    }

    fn matches_search(&self, evaluation: &PaperEvaluation, needle: &str) -> bool {
        let hit = |text: &str| text.to_lowercase().contains(needle);
        hit(&evaluation.summary)
            || hit(&evaluation.recommendation)
            || self
                .dimensions
                .iter()
                .filter(|d| d.evaluation_id == evaluation.id)
                .any(|d| hit(&d.description) || hit(&d.evidence))
    }
}

/// Best score first, then newest, id breaking ties.
fn best_first(items: &mut [PaperEvaluation]) {
    items.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then((b.created_at, b.id).cmp(&(a.created_at, a.id)))
    });
}

/// Newest first, id breaking ties.
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_activity_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every unit of work that appends an activity fail before writing
    /// anything. Used to exercise rollback paths.
    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of activity rows, tombstoned ones included.
    pub fn activity_row_count(&self) -> usize {
        self.state().activities.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_activity_write(&self) -> Result<()> {
        if self.fail_activity_writes.load(Ordering::SeqCst) {
            return Err(PaperGraphError::Database(
                "activity write failed (injected)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn get_or_create_stats(&self, user_id: UserId) -> Result<UserStats> {
        let mut state = self.state();
        let now = state.tick();
        let stats = state
            .stats
            .entry(user_id)
            .or_insert_with(|| UserStats::zeroed(user_id, now));
        if stats.deleted_at.is_some() {
            stats.deleted_at = None;
            stats.updated_at = now;
        }
        Ok(stats.clone())
    }

    async fn apply_stat_delta(
        &self,
        user_id: UserId,
        field: StatField,
        delta: i64,
    ) -> Result<UserStats> {
        Ok(self.state().apply_delta(user_id, field, delta))
    }

    async fn tombstone_stats(&self, user_id: UserId) -> Result<bool> {
        let mut state = self.state();
        let now = state.tick();
        match state.stats.get_mut(&user_id) {
            Some(stats) if stats.deleted_at.is_none() => {
                stats.deleted_at = Some(now);
                stats.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats_user_ids(&self) -> Result<Vec<UserId>> {
        Ok(self
            .state()
            .stats
            .values()
            .filter(|s| s.deleted_at.is_none())
            .map(|s| s.user_id)
            .collect())
    }
}

#[async_trait]
impl BadgeRepository for MemoryStore {
    async fn seed_badge_templates(&self, templates: &[NewBadgeTemplate]) -> Result<usize> {
        let mut state = self.state();
        let mut inserted = 0;
        for template in templates {
            if state
                .templates
                .iter()
                .any(|t| t.badge_type == template.badge_type)
            {
                continue;
            }
            let id = state.next_id();
            let created_at = state.tick();
            state.templates.push(BadgeTemplate {
                id,
                badge_type: template.badge_type.clone(),
                name: template.name.clone(),
                description: template.description.clone(),
                icon: template.icon.clone(),
                condition: template.condition.clone(),
                level: template.level,
                category: template.category,
                created_at,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_badge_templates(&self) -> Result<Vec<BadgeTemplate>> {
        Ok(self.state().templates.clone())
    }

    async fn find_badge_template(&self, badge_type: &str) -> Result<Option<BadgeTemplate>> {
        Ok(self
            .state()
            .templates
            .iter()
            .find(|t| t.badge_type == badge_type)
            .cloned())
    }

    async fn find_user_badge(
        &self,
        user_id: UserId,
        badge_type: &str,
    ) -> Result<Option<UserBadge>> {
        Ok(self
            .state()
            .badges
            .iter()
            .find(|b| b.user_id == user_id && b.badge_type == badge_type && b.deleted_at.is_none())
            .cloned())
    }

    async fn award_badge(
        &self,
        user_id: UserId,
        template: &BadgeTemplate,
        activity: NewActivity,
    ) -> Result<Option<UserBadge>> {
        let mut state = self.state();
        // UNIQUE(user_id, badge_type) covers tombstoned rows too.
        if state
            .badges
            .iter()
            .any(|b| b.user_id == user_id && b.badge_type == template.badge_type)
        {
            return Ok(None);
        }
        self.check_activity_write()?;

        let id = state.next_id();
        let created_at = state.tick();
        let badge = UserBadge {
            id,
            user_id,
            badge_type: template.badge_type.clone(),
            name: template.name.clone(),
            description: template.description.clone(),
            icon: template.icon.clone(),
            level: template.level,
            created_at,
            deleted_at: None,
        };
        state.badges.push(badge.clone());
        state.insert_activity(&NewActivity {
            target_id: badge.id,
            ..activity
        });
        Ok(Some(badge))
    }

    async fn list_user_badges(&self, user_id: UserId) -> Result<Vec<UserBadge>> {
        let mut badges: Vec<UserBadge> = self
            .state()
            .badges
            .iter()
            .filter(|b| b.user_id == user_id && b.deleted_at.is_none())
            .cloned()
            .collect();
        newest_first(&mut badges, |b| (b.created_at, b.id));
        Ok(badges)
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn insert_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: NewActivity,
    ) -> Result<Option<UserFollow>> {
        if follower_id == following_id {
            return Err(PaperGraphError::validation(
                "a user cannot follow themselves",
            ));
        }
        let mut state = self.state();
        if state.is_following(follower_id, following_id) {
            return Ok(None);
        }
        self.check_activity_write()?;

        let id = state.next_id();
        let created_at = state.tick();
        let edge = UserFollow {
            id,
            follower_id,
            following_id,
            created_at,
            deleted_at: None,
        };
        state.follows.push(edge.clone());
        state.insert_activity(&activity);
        state.apply_delta(follower_id, StatField::FollowingCount, 1);
        state.apply_delta(following_id, StatField::FollowerCount, 1);
        Ok(Some(edge))
    }

    async fn remove_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
        activity: Option<NewActivity>,
    ) -> Result<Option<UserFollow>> {
        let mut state = self.state();
        let Some(index) = state.follows.iter().position(|f| {
            f.follower_id == follower_id && f.following_id == following_id && f.deleted_at.is_none()
        }) else {
            return Ok(None);
        };
        if activity.is_some() {
            self.check_activity_write()?;
        }

        let now = state.tick();
        state.follows[index].deleted_at = Some(now);
        let edge = state.follows[index].clone();
        if let Some(activity) = activity {
            state.insert_activity(&activity);
        }
        state.apply_delta(follower_id, StatField::FollowingCount, -1);
        state.apply_delta(following_id, StatField::FollowerCount, -1);
        Ok(Some(edge))
    }

    async fn is_following(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        Ok(self.state().is_following(follower_id, following_id))
    }

    async fn list_following(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        let mut edges: Vec<UserFollow> = self
            .state()
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id && f.deleted_at.is_none())
            .cloned()
            .collect();
        newest_first(&mut edges, |f| (f.created_at, f.id));
        Ok(page.slice(edges))
    }

    async fn list_followers(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        let mut edges: Vec<UserFollow> = self
            .state()
            .follows
            .iter()
            .filter(|f| f.following_id == user_id && f.deleted_at.is_none())
            .cloned()
            .collect();
        newest_first(&mut edges, |f| (f.created_at, f.id));
        Ok(page.slice(edges))
    }

    async fn following_ids(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let ids: BTreeSet<UserId> = self
            .state()
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id && f.deleted_at.is_none())
            .map(|f| f.following_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl ReactionRepository for MemoryStore {
    async fn find_reaction(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reaction_type: ReactionType,
    ) -> Result<Option<TaskReaction>> {
        let state = self.state();
        Ok(state
            .live_reaction_index(user_id, task_id, reaction_type)
            .map(|i| state.reactions[i].clone()))
    }

    async fn toggle_reaction(&self, change: ReactionChange) -> Result<ReactionToggle> {
        let mut state = self.state();
        self.check_activity_write()?;

        let now = state.tick();
        let (toggle, activity, delta) =
            match state.live_reaction_index(change.user_id, change.task_id, change.reaction_type) {
                Some(index) => {
                    state.reactions[index].deleted_at = Some(now);
                    let removed = state.reactions[index].clone();
                    (ReactionToggle::Removed(removed), &change.on_remove, -1)
                }
                None => {
                    let id = state.next_id();
                    let reaction = TaskReaction {
                        id,
                        task_id: change.task_id,
                        user_id: change.user_id,
                        reaction_type: change.reaction_type,
                        created_at: now,
                        deleted_at: None,
                    };
                    state.reactions.push(reaction.clone());
                    (ReactionToggle::Added(reaction), &change.on_add, 1)
                }
            };

        state.insert_activity(activity);
        if let Some((credited, field)) = change.credit {
            state.apply_delta(credited, field, delta);
        }
        if change.adjust_task_likes {
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == change.task_id) {
                task.like_count = (task.like_count + delta).max(0);
            }
        }
        Ok(toggle)
    }

    async fn reaction_counts(&self, task_id: TaskId) -> Result<BTreeMap<ReactionType, i64>> {
        let mut counts = BTreeMap::new();
        for reaction in self
            .state()
            .reactions
            .iter()
            .filter(|r| r.task_id == task_id && r.deleted_at.is_none())
        {
            *counts.entry(reaction.reaction_type).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn append_activity(&self, activity: NewActivity) -> Result<UserActivity> {
        self.check_activity_write()?;
        Ok(self.state().insert_activity(&activity))
    }

    async fn find_activity(&self, id: i64) -> Result<Option<FeedActivity>> {
        let state = self.state();
        Ok(state
            .activities
            .iter()
            .find(|a| a.id == id && a.deleted_at.is_none())
            .map(|a| state.feed_activity(a)))
    }

    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<(Vec<FeedActivity>, i64)> {
        let state = self.state();
        let mut matched: Vec<&UserActivity> = state
            .activities
            .iter()
            .filter(|a| a.deleted_at.is_none() && filter.matches(a))
            .collect();
        newest_first(&mut matched, |a| (a.created_at, a.id));
        let total = matched.len() as i64;
        let items = page
            .slice(matched)
            .into_iter()
            .map(|a| state.feed_activity(a))
            .collect();
        Ok((items, total))
    }

    async fn tombstone_activity(&self, id: i64, user_id: UserId) -> Result<bool> {
        let mut state = self.state();
        let now = state.tick();
        match state
            .activities
            .iter_mut()
            .find(|a| a.id == id && a.user_id == user_id && a.deleted_at.is_none())
        {
            Some(activity) => {
                activity.deleted_at = Some(now);
                activity.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activity_stats(&self, user_id: UserId, since: DateTime<Utc>) -> Result<ActivityStats> {
        let mut stats = ActivityStats::default();
        for activity in self
            .state()
            .activities
            .iter()
            .filter(|a| a.user_id == user_id && a.deleted_at.is_none())
        {
            stats.total += 1;
            if activity.created_at >= since {
                stats.recent_7_days += 1;
            }
            *stats
                .by_event_type
                .entry(activity.event_type.to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn activity_feed(
        &self,
        viewer: UserId,
        audience: &[UserId],
        page: Page,
    ) -> Result<Vec<FeedActivity>> {
        let state = self.state();
        let mut visible: Vec<&UserActivity> = state
            .activities
            .iter()
            .filter(|a| a.deleted_at.is_none() && audience.contains(&a.user_id))
            .filter(|a| {
                a.user_id == viewer
                    || match a.visibility {
                        Visibility::Public => true,
                        Visibility::Friends => state.is_following(a.user_id, viewer),
                        Visibility::Private => false,
                    }
            })
            .collect();
        newest_first(&mut visible, |a| (a.created_at, a.id));
        Ok(page
            .slice(visible)
            .into_iter()
            .map(|a| state.feed_activity(a))
            .collect())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn create_task(&self, user_id: UserId, paper_id: i64) -> Result<AnalysisTask> {
        let mut state = self.state();
        let id = state.next_id();
        let created_at = state.tick();
        let task = AnalysisTask {
            id,
            user_id,
            paper_id,
            status: TaskStatus::InProgress,
            is_public: false,
            suggest_score: 0,
            like_count: 0,
            read_count: 0,
            created_at,
            finished_at: None,
            deleted_at: None,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, task_id: TaskId) -> Result<Option<AnalysisTask>> {
        Ok(self.state().live_task(task_id).cloned())
    }

    async fn complete_task(&self, completion: TaskCompletion) -> Result<AnalysisTask> {
        let mut state = self.state();
        let index = state.live_task_index(completion.task_id)?;
        let status = state.tasks[index].status;
        if status != TaskStatus::InProgress {
            return Err(PaperGraphError::validation(format!(
                "task {} is {status}, cannot move to {}",
                completion.task_id,
                TaskStatus::Completed
            )));
        }
        self.check_activity_write()?;

        let now = state.tick();
        let task = {
            let task = &mut state.tasks[index];
            task.status = TaskStatus::Completed;
            task.finished_at = Some(now);
            task.suggest_score = completion.suggest_score;
            task.clone()
        };

        let id = state.next_id();
        state.results.push(AnalysisResult {
            id,
            task_id: task.id,
            content: completion.content,
            created_at: now,
        });
        state.apply_delta(task.user_id, StatField::AnalysisCount, 1);
        if task.is_public {
            state.apply_delta(task.user_id, StatField::PublicAnalysisCount, 1);
        }
        state.insert_activity(&completion.activity);
        Ok(task)
    }

    async fn fail_task(&self, task_id: TaskId) -> Result<AnalysisTask> {
        let mut state = self.state();
        let index = state.live_task_index(task_id)?;
        let status = state.tasks[index].status;
        if status != TaskStatus::InProgress {
            return Err(PaperGraphError::validation(format!(
                "task {task_id} is {status}, cannot move to {}",
                TaskStatus::Failed
            )));
        }

        let now = state.tick();
        let task = &mut state.tasks[index];
        task.status = TaskStatus::Failed;
        task.finished_at = Some(now);
        Ok(task.clone())
    }

    async fn set_task_public(&self, task_id: TaskId, is_public: bool) -> Result<AnalysisTask> {
        let mut state = self.state();
        let index = state.live_task_index(task_id)?;
        if state.tasks[index].is_public == is_public {
            return Ok(state.tasks[index].clone());
        }

        state.tasks[index].is_public = is_public;
        let task = state.tasks[index].clone();
        if task.status == TaskStatus::Completed {
            let delta = if is_public { 1 } else { -1 };
            state.apply_delta(task.user_id, StatField::PublicAnalysisCount, delta);
        }
        Ok(task)
    }

    async fn find_result(&self, task_id: TaskId) -> Result<Option<AnalysisResult>> {
        Ok(self
            .state()
            .results
            .iter()
            .find(|r| r.task_id == task_id)
            .cloned())
    }

    async fn list_user_tasks(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        page: Page,
    ) -> Result<Vec<AnalysisTask>> {
        let mut tasks: Vec<AnalysisTask> = self
            .state()
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id && t.deleted_at.is_none())
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        newest_first(&mut tasks, |t| (t.created_at, t.id));
        Ok(page.slice(tasks))
    }

    async fn analysis_feed(&self, audience: &[UserId], page: Page) -> Result<Vec<FeedAnalysis>> {
        let state = self.state();
        let mut tasks: Vec<&AnalysisTask> = state
            .tasks
            .iter()
            .filter(|t| t.is_feed_visible() && audience.contains(&t.user_id))
            .collect();
        newest_first(&mut tasks, |t| (t.created_at, t.id));
        Ok(page
            .slice(tasks)
            .into_iter()
            .map(|t| state.feed_analysis(t))
            .collect())
    }

    async fn public_feed(&self, order: FeedOrder, page: Page) -> Result<Vec<FeedAnalysis>> {
        let state = self.state();
        let mut tasks: Vec<&AnalysisTask> =
            state.tasks.iter().filter(|t| t.is_feed_visible()).collect();
        // Option<DateTime> orders None first, matching NULLS LAST when reversed.
        tasks.sort_by(|a, b| {
            let recent = (b.finished_at, b.id).cmp(&(a.finished_at, a.id));
            match order {
                FeedOrder::Likes => b.like_count.cmp(&a.like_count).then(recent),
                FeedOrder::Suggestion => b.suggest_score.cmp(&a.suggest_score).then(recent),
                FeedOrder::Recent => recent,
            }
        });
        Ok(page
            .slice(tasks)
            .into_iter()
            .map(|t| state.feed_analysis(t))
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert_comment(&self, comment: NewComment, activity: NewActivity) -> Result<Comment> {
        let mut state = self.state();
        if let Some(parent_id) = comment.parent_id {
            let live_parent = state.comments.iter().any(|c| {
                c.id == parent_id && c.task_id == comment.task_id && c.deleted_at.is_none()
            });
            if !live_parent {
                return Err(PaperGraphError::not_found("comment", parent_id));
            }
        }
        self.check_activity_write()?;

        let id = state.next_id();
        let created_at = state.tick();
        let created = Comment {
            id,
            task_id: comment.task_id,
            user_id: comment.user_id,
            content: comment.content,
            parent_id: comment.parent_id,
            created_at,
            deleted_at: None,
        };
        state.comments.push(created.clone());
        state.apply_delta(created.user_id, StatField::CommentCount, 1);
        state.insert_activity(&NewActivity {
            target_id: created.id,
            ..activity
        });
        Ok(created)
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(self
            .state()
            .comments
            .iter()
            .find(|c| c.id == id && c.deleted_at.is_none())
            .cloned())
    }

    async fn list_comments(&self, task_id: TaskId) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .state()
            .comments
            .iter()
            .filter(|c| c.task_id == task_id && c.deleted_at.is_none())
            .cloned()
            .collect();
        comments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(comments)
    }
}

#[async_trait]
impl EvaluationRepository for MemoryStore {
    async fn insert_evaluation(
        &self,
        evaluation: NewEvaluation,
        activity: NewActivity,
    ) -> Result<EvaluationDetail> {
        let mut state = self.state();
        self.check_activity_write()?;

        let id = state.next_id();
        let now = state.tick();
        let created = PaperEvaluation {
            id,
            analysis_id: evaluation.analysis_id,
            user_id: evaluation.user_id,
            paper_id: evaluation.paper_id,
            overall_score: evaluation.overall_score,
            summary: evaluation.summary,
            recommendation: evaluation.recommendation,
            scores: evaluation.scores,
            is_public: evaluation.is_public,
            is_verified: false,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.evaluations.push(created.clone());

        for new_dimension in evaluation.dimensions {
            let dimension_id = state.next_id();
            state.dimensions.push(EvaluationDimension {
                id: dimension_id,
                evaluation_id: id,
                dimension_key: new_dimension.dimension_key,
                dimension_name: new_dimension.dimension_name,
                score: new_dimension.score,
                description: new_dimension.description,
                evidence: new_dimension.evidence,
                created_at: now,
            });
            for new_metric in new_dimension.metrics {
                let metric_id = state.next_id();
                state.metrics.push(EvaluationMetric {
                    id: metric_id,
                    dimension_id,
                    metric_key: new_metric.metric_key,
                    metric_name: new_metric.metric_name,
                    score: new_metric.score,
                    description: new_metric.description,
                    evidence: new_metric.evidence,
                    created_at: now,
                });
            }
        }

        state.insert_activity(&NewActivity {
            target_id: id,
            ..activity
        });
        Ok(state.evaluation_detail(&created))
    }

    async fn find_evaluation(&self, id: EvaluationId) -> Result<Option<EvaluationDetail>> {
        let state = self.state();
        Ok(state
            .evaluations
            .iter()
            .find(|e| e.id == id && e.deleted_at.is_none())
            .map(|e| state.evaluation_detail(e)))
    }

    async fn find_evaluation_by_analysis(
        &self,
        analysis_id: TaskId,
    ) -> Result<Option<EvaluationDetail>> {
        let state = self.state();
        Ok(state
            .evaluations
            .iter()
            .filter(|e| e.analysis_id == Some(analysis_id) && e.deleted_at.is_none())
            .max_by_key(|e| (e.created_at, e.id))
            .map(|e| state.evaluation_detail(e)))
    }

    async fn update_evaluation(
        &self,
        id: EvaluationId,
        update: EvaluationUpdate,
        activity: NewActivity,
    ) -> Result<PaperEvaluation> {
        let mut state = self.state();
        let idx = state.live_evaluation_index(id)?;
        self.check_activity_write()?;

        let now = state.tick();
        let evaluation = &mut state.evaluations[idx];
        evaluation.overall_score = update.overall_score;
        evaluation.summary = update.summary;
        evaluation.recommendation = update.recommendation;
        evaluation.scores = update.scores;
        evaluation.is_public = update.is_public;
        evaluation.updated_at = now;
        let updated = evaluation.clone();

        state.insert_activity(&activity);
        Ok(updated)
    }

    async fn tombstone_evaluation(&self, id: EvaluationId) -> Result<bool> {
        let mut state = self.state();
        let Ok(idx) = state.live_evaluation_index(id) else {
            return Ok(false);
        };
        let now = state.tick();
        state.evaluations[idx].deleted_at = Some(now);
        Ok(true)
    }

    async fn toggle_evaluation_like(
        &self,
        evaluation_id: EvaluationId,
        user_id: UserId,
        on_like: NewActivity,
    ) -> Result<EvaluationLikeToggle> {
        let mut state = self.state();
        let idx = state.live_evaluation_index(evaluation_id)?;
        let existing = state.evaluation_likes.iter().position(|l| {
            l.evaluation_id == evaluation_id && l.user_id == user_id && l.deleted_at.is_none()
        });
        if existing.is_none() {
            self.check_activity_write()?;
        }

        let now = state.tick();
        let liked = match existing {
            Some(like_idx) => {
                state.evaluation_likes[like_idx].deleted_at = Some(now);
                let evaluation = &mut state.evaluations[idx];
                evaluation.like_count = (evaluation.like_count - 1).max(0);
                false
            }
            None => {
                state.evaluation_likes.push(EvaluationLike {
                    evaluation_id,
                    user_id,
                    deleted_at: None,
                });
                state.evaluations[idx].like_count += 1;
                state.insert_activity(&on_like);
                true
            }
        };

        Ok(EvaluationLikeToggle {
            evaluation_id,
            liked,
            like_count: state.evaluations[idx].like_count,
        })
    }

    async fn list_paper_evaluations(
        &self,
        paper_id: i64,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let mut items: Vec<PaperEvaluation> = self
            .state()
            .evaluations
            .iter()
            .filter(|e| e.paper_id == paper_id && e.is_public && e.deleted_at.is_none())
            .cloned()
            .collect();
        best_first(&mut items);
        let total = items.len() as i64;
        Ok((page.slice(items), total))
    }

    async fn list_user_evaluations(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let mut items: Vec<PaperEvaluation> = self
            .state()
            .evaluations
            .iter()
            .filter(|e| e.user_id == user_id && e.deleted_at.is_none())
            .cloned()
            .collect();
        newest_first(&mut items, |e| (e.created_at, e.id));
        let total = items.len() as i64;
        Ok((page.slice(items), total))
    }

    async fn top_evaluations(&self, limit: i64) -> Result<Vec<PaperEvaluation>> {
        let mut items: Vec<PaperEvaluation> = self
            .state()
            .evaluations
            .iter()
            .filter(|e| e.is_public && e.deleted_at.is_none())
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.overall_score
                .total_cmp(&a.overall_score)
                .then(b.like_count.cmp(&a.like_count))
                .then(b.id.cmp(&a.id))
        });
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn search_evaluations(
        &self,
        query: &str,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let needle = query.to_lowercase();
        let state = self.state();
        let mut items: Vec<PaperEvaluation> = state
            .evaluations
            .iter()
            .filter(|e| e.is_public && e.deleted_at.is_none())
            .filter(|e| state.matches_search(e, &needle))
            .cloned()
            .collect();
        best_first(&mut items);
        let total = items.len() as i64;
        Ok((page.slice(items), total))
    }

    async fn evaluation_statistics(&self, paper_id: i64) -> Result<EvaluationStatistics> {
        let state = self.state();
        let scores: Vec<f64> = state
            .evaluations
            .iter()
            .filter(|e| e.paper_id == paper_id && e.is_public && e.deleted_at.is_none())
            .map(|e| e.overall_score)
            .collect();

        let mut stats = EvaluationStatistics::empty(paper_id);
        stats.total_evaluations = scores.len() as i64;
        if !scores.is_empty() {
            stats.avg_overall_score = scores.iter().sum::<f64>() / scores.len() as f64;
        }
        for score in scores {
            *stats.score_distribution.entry(ScoreBand::of(score)).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn upsert_user(&self, author: Author) -> Result<()> {
        self.state().users.insert(author.id, author);
        Ok(())
    }

    async fn find_author(&self, user_id: UserId) -> Result<Option<Author>> {
        Ok(self.state().author(user_id))
    }
}
