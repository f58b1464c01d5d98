use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::*;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Per-user aggregate counters. Every counter is clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserStats {
    pub user_id: UserId,
    pub analysis_count: i64,
    pub public_analysis_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub share_count: i64,
    pub total_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserStats {
    pub fn zeroed(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            analysis_count: 0,
            public_analysis_count: 0,
            like_count: 0,
            comment_count: 0,
            follower_count: 0,
            following_count: 0,
            share_count: 0,
            total_score: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn get(&self, field: StatField) -> i64 {
        match field {
            StatField::AnalysisCount => self.analysis_count,
            StatField::PublicAnalysisCount => self.public_analysis_count,
            StatField::LikeCount => self.like_count,
            StatField::CommentCount => self.comment_count,
            StatField::FollowerCount => self.follower_count,
            StatField::FollowingCount => self.following_count,
            StatField::ShareCount => self.share_count,
            StatField::TotalScore => self.total_score,
        }
    }

    /// Additive update, floored at zero.
    pub fn apply(&mut self, field: StatField, delta: i64) {
        let slot = match field {
            StatField::AnalysisCount => &mut self.analysis_count,
            StatField::PublicAnalysisCount => &mut self.public_analysis_count,
            StatField::LikeCount => &mut self.like_count,
            StatField::CommentCount => &mut self.comment_count,
            StatField::FollowerCount => &mut self.follower_count,
            StatField::FollowingCount => &mut self.following_count,
            StatField::ShareCount => &mut self.share_count,
            StatField::TotalScore => &mut self.total_score,
        };
        *slot = (*slot + delta).max(0);
    }
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

/// Catalog entry. Read-only once seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BadgeTemplate {
    pub id: BadgeId,
    pub badge_type: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub condition: String,
    pub level: i32,
    #[sqlx(try_from = "String")]
    pub category: BadgeCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBadgeTemplate {
    pub badge_type: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub condition: String,
    pub level: i32,
    pub category: BadgeCategory,
}

/// An awarded badge. Name, description, icon and level are copied from the
/// template at award time and never follow later template edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserBadge {
    pub id: BadgeId,
    pub user_id: UserId,
    pub badge_type: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserFollow {
    pub id: i64,
    pub follower_id: UserId,
    pub following_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Minimal author info attached to feed entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserActivity {
    pub id: ActivityId,
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub event_type: EventType,
    #[sqlx(try_from = "String")]
    pub target_type: TargetType,
    pub target_id: i64,
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
    #[sqlx(try_from = "String")]
    pub visibility: Visibility,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An activity to be appended. The caller builds this; the store assigns
/// id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub user_id: UserId,
    pub event_type: EventType,
    pub target_type: TargetType,
    pub target_id: i64,
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub visibility: Visibility,
}

impl NewActivity {
    pub fn new(
        user_id: UserId,
        event_type: EventType,
        target_type: TargetType,
        target_id: i64,
    ) -> Self {
        Self {
            user_id,
            event_type,
            target_type,
            target_id,
            title: String::new(),
            content: String::new(),
            metadata: serde_json::Value::Null,
            visibility: Visibility::Public,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Filters for the activity listing. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub user_id: Option<UserId>,
    pub event_type: Option<EventType>,
    pub target_type: Option<TargetType>,
    pub target_id: Option<i64>,
    pub visibility: Option<Visibility>,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &UserActivity) -> bool {
        self.user_id.map_or(true, |v| activity.user_id == v)
            && self.event_type.map_or(true, |v| activity.event_type == v)
            && self.target_type.map_or(true, |v| activity.target_type == v)
            && self.target_id.map_or(true, |v| activity.target_id == v)
            && self.visibility.map_or(true, |v| activity.visibility == v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total: i64,
    pub by_event_type: BTreeMap<String, i64>,
    pub recent_7_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedActivity {
    #[serde(flatten)]
    pub activity: UserActivity,
    pub author: Option<Author>,
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskReaction {
    pub id: i64,
    pub task_id: TaskId,
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Result of a reaction toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reaction", rename_all = "snake_case")]
pub enum ReactionToggle {
    Added(TaskReaction),
    Removed(TaskReaction),
}

impl ReactionToggle {
    pub fn is_active(&self) -> bool {
        matches!(self, ReactionToggle::Added(_))
    }

    pub fn reaction(&self) -> &TaskReaction {
        match self {
            ReactionToggle::Added(r) | ReactionToggle::Removed(r) => r,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisTask {
    pub id: TaskId,
    pub user_id: UserId,
    pub paper_id: i64,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub is_public: bool,
    pub suggest_score: i32,
    pub like_count: i64,
    pub read_count: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnalysisTask {
    /// Eligible for any feed: completed, public, not tombstoned.
    pub fn is_feed_visible(&self) -> bool {
        self.status == TaskStatus::Completed && self.is_public && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisResult {
    pub id: i64,
    pub task_id: TaskId,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Everything a completion writes, applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub content: serde_json::Value,
    pub suggest_score: i32,
    pub activity: NewActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedAnalysis {
    #[serde(flatten)]
    pub task: AnalysisTask,
    pub author: Option<Author>,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

// ---------------------------------------------------------------------------
// Paper evaluations
// ---------------------------------------------------------------------------

/// Dimension and category scores, each on a 0..=10 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EvaluationScores {
    pub originality_score: f64,
    pub depth_score: f64,
    pub logic_score: f64,
    pub evidence_score: f64,
    pub language_score: f64,
    pub value_score: f64,
    pub content_score: f64,
    pub structure_score: f64,
    pub method_score: f64,
}

impl EvaluationScores {
    pub fn named(&self) -> [(&'static str, f64); 9] {
        [
            ("originality_score", self.originality_score),
            ("depth_score", self.depth_score),
            ("logic_score", self.logic_score),
            ("evidence_score", self.evidence_score),
            ("language_score", self.language_score),
            ("value_score", self.value_score),
            ("content_score", self.content_score),
            ("structure_score", self.structure_score),
            ("method_score", self.method_score),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaperEvaluation {
    pub id: EvaluationId,
    pub analysis_id: Option<TaskId>,
    pub user_id: UserId,
    pub paper_id: i64,
    pub overall_score: f64,
    pub summary: String,
    pub recommendation: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub scores: EvaluationScores,
    pub is_public: bool,
    pub is_verified: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PaperEvaluation {
    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.overall_score)
    }

    /// Public evaluations are visible to everyone, private ones to the author.
    pub fn visible_to(&self, viewer: UserId) -> bool {
        self.is_public || self.user_id == viewer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EvaluationDimension {
    pub id: i64,
    pub evaluation_id: EvaluationId,
    pub dimension_key: String,
    pub dimension_name: String,
    pub score: f64,
    pub description: String,
    pub evidence: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EvaluationMetric {
    pub id: i64,
    pub dimension_id: i64,
    pub metric_key: String,
    pub metric_name: String,
    pub score: f64,
    pub description: String,
    pub evidence: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDetail {
    #[serde(flatten)]
    pub dimension: EvaluationDimension,
    pub metrics: Vec<EvaluationMetric>,
}

/// An evaluation with its dimensions and their metrics, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    #[serde(flatten)]
    pub evaluation: PaperEvaluation,
    pub dimensions: Vec<DimensionDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMetric {
    pub metric_key: String,
    pub metric_name: String,
    pub score: f64,
    pub description: String,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDimension {
    pub dimension_key: String,
    pub dimension_name: String,
    pub score: f64,
    pub description: String,
    pub evidence: String,
    pub metrics: Vec<NewMetric>,
}

/// A validated evaluation ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvaluation {
    pub user_id: UserId,
    pub paper_id: i64,
    pub analysis_id: Option<TaskId>,
    pub overall_score: f64,
    pub summary: String,
    pub recommendation: String,
    pub scores: EvaluationScores,
    pub is_public: bool,
    pub dimensions: Vec<NewDimension>,
}

/// The owner-editable part of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationUpdate {
    pub overall_score: f64,
    pub summary: String,
    pub recommendation: String,
    pub scores: EvaluationScores,
    pub is_public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationLikeToggle {
    pub evaluation_id: EvaluationId,
    pub liked: bool,
    pub like_count: i64,
}

/// Aggregates over a paper's public evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStatistics {
    pub paper_id: i64,
    pub total_evaluations: i64,
    pub avg_overall_score: f64,
    pub score_distribution: BTreeMap<ScoreBand, i64>,
}

impl EvaluationStatistics {
    /// Every band present, zero when no evaluation falls in it.
    pub fn empty(paper_id: i64) -> Self {
        Self {
            paper_id,
            total_evaluations: 0,
            avg_overall_score: 0.0,
            score_distribution: ScoreBand::ALL.iter().map(|b| (*b, 0)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_floors_at_zero() {
        let mut stats = UserStats::zeroed(1, Utc::now());
        stats.apply(StatField::LikeCount, 2);
        stats.apply(StatField::LikeCount, -5);
        assert_eq!(stats.like_count, 0);
        stats.apply(StatField::LikeCount, 3);
        assert_eq!(stats.get(StatField::LikeCount), 3);
    }

    #[test]
    fn filter_matches_all_set_fields() {
        let now = Utc::now();
        let activity = UserActivity {
            id: 1,
            user_id: 7,
            event_type: EventType::FollowUser,
            target_type: TargetType::User,
            target_id: 9,
            title: String::new(),
            content: String::new(),
            metadata: serde_json::Value::Null,
            visibility: Visibility::Public,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(ActivityFilter::default().matches(&activity));
        let filter = ActivityFilter {
            user_id: Some(7),
            event_type: Some(EventType::FollowUser),
            ..Default::default()
        };
        assert!(filter.matches(&activity));
        let filter = ActivityFilter {
            target_type: Some(TargetType::Task),
            ..Default::default()
        };
        assert!(!filter.matches(&activity));
    }
}
