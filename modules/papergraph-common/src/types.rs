use serde::{Deserialize, Serialize};

use crate::error::PaperGraphError;

pub type UserId = i64;
pub type TaskId = i64;
pub type BadgeId = i64;
pub type ActivityId = i64;
pub type CommentId = i64;
pub type EvaluationId = i64;

/// Declares a closed, text-backed enumeration. The wire/column form is the
/// given literal; parsing anything else is a validation error.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        // Lets `sqlx::FromRow` decode TEXT columns with `#[sqlx(try_from = "String")]`.
        impl TryFrom<String> for $name {
            type Error = PaperGraphError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::str::FromStr for $name {
            type Err = PaperGraphError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(PaperGraphError::Validation(format!(
                        "invalid {}: {other}",
                        $label
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// What happened, as recorded in the activity log.
    EventType("event type") {
        PaperAnalyzed => "paper_analyzed",
        PaperLiked => "paper_liked",
        PaperRecommended => "paper_recommended",
        PaperShared => "paper_shared",
        AnalysisCreated => "analysis_created",
        AnalysisUpdated => "analysis_updated",
        AnalysisCompleted => "analysis_completed",
        EvaluationCreated => "evaluation_created",
        EvaluationUpdated => "evaluation_updated",
        EvaluationLiked => "evaluation_liked",
        CommentCreated => "comment_created",
        CommentLiked => "comment_liked",
        CommentReplied => "comment_replied",
        BadgeEarned => "badge_earned",
        LevelUp => "level_up",
        FollowUser => "follow_user",
        UnfollowUser => "unfollow_user",
        React => "react",
        Unreact => "unreact",
    }
}

text_enum! {
    TargetType("target type") {
        Paper => "paper",
        Analysis => "analysis",
        Evaluation => "evaluation",
        Comment => "comment",
        User => "user",
        Badge => "badge",
        Task => "task",
    }
}

text_enum! {
    Visibility("visibility") {
        Public => "public",
        Private => "private",
        Friends => "friends",
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

text_enum! {
    /// A typed, toggleable response to an analysis task.
    ReactionType("reaction type") {
        Like => "like",
        Agree => "agree",
        Disagree => "disagree",
        Biased => "biased",
        Share => "share",
    }
}

impl ReactionType {
    /// Only likes and shares feed a stats counter; the rest are kept for
    /// moderation and analytics.
    pub fn stat_field(&self) -> Option<StatField> {
        match self {
            ReactionType::Like => Some(StatField::LikeCount),
            ReactionType::Share => Some(StatField::ShareCount),
            ReactionType::Agree | ReactionType::Disagree | ReactionType::Biased => None,
        }
    }

    /// Short verb phrase used in activity titles.
    pub fn describe(&self, undo: bool) -> &'static str {
        match (self, undo) {
            (ReactionType::Like, false) => "liked the analysis",
            (ReactionType::Like, true) => "removed a like from the analysis",
            (ReactionType::Agree, false) => "agreed with the analysis",
            (ReactionType::Agree, true) => "withdrew agreement with the analysis",
            (ReactionType::Disagree, false) => "disagreed with the analysis",
            (ReactionType::Disagree, true) => "withdrew disagreement with the analysis",
            (ReactionType::Biased, false) => "flagged the analysis as biased",
            (ReactionType::Biased, true) => "withdrew the bias flag on the analysis",
            (ReactionType::Share, false) => "shared the analysis",
            (ReactionType::Share, true) => "unshared the analysis",
        }
    }
}

text_enum! {
    BadgeCategory("badge category") {
        Analysis => "analysis",
        Social => "social",
        Sharing => "sharing",
        Subscription => "subscription",
    }
}

text_enum! {
    /// One counter column of `user_stats`.
    StatField("stat field") {
        AnalysisCount => "analysis_count",
        PublicAnalysisCount => "public_analysis_count",
        LikeCount => "like_count",
        CommentCount => "comment_count",
        FollowerCount => "follower_count",
        FollowingCount => "following_count",
        ShareCount => "share_count",
        TotalScore => "total_score",
    }
}

impl StatField {
    /// Column name in `user_stats`. Always one of a fixed set of identifiers,
    /// so it is safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        self.as_str()
    }
}

text_enum! {
    TaskStatus("task status") {
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
    }
}

text_enum! {
    /// Quality band of a 0..=10 evaluation score.
    ScoreBand("score band") {
        Excellent => "excellent",
        Good => "good",
        Average => "average",
        Poor => "poor",
    }
}

impl ScoreBand {
    pub fn of(score: f64) -> Self {
        if score >= 8.0 {
            ScoreBand::Excellent
        } else if score >= 6.0 {
            ScoreBand::Good
        } else if score >= 4.0 {
            ScoreBand::Average
        } else {
            ScoreBand::Poor
        }
    }

    /// Default recommendation when the evaluator leaves it blank.
    pub fn advice(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => {
                "Ready for a strong venue; polish the remaining details."
            }
            ScoreBand::Good => "Suitable for a general venue; focus on the weakest dimensions.",
            ScoreBand::Average => "Needs substantial revision; add data and deepen the analysis.",
            ScoreBand::Poor => "Rethink the framing and the research method.",
        }
    }
}

/// Ordering of the public analysis feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrder {
    /// Most liked first.
    Likes,
    /// Strongest read-the-paper suggestion first.
    Suggestion,
    /// Most recently completed first.
    #[default]
    Recent,
}

impl FeedOrder {
    /// Exact match on `like` and `suggest`. Anything else, including
    /// near misses like `likes`, falls back to `Recent`; never an error.
    pub fn parse(s: &str) -> Self {
        match s {
            "like" => FeedOrder::Likes,
            "suggest" => FeedOrder::Suggestion,
            _ => FeedOrder::Recent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedOrder::Likes => "like",
            FeedOrder::Suggestion => "suggest",
            FeedOrder::Recent => "recent",
        }
    }
}

impl std::fmt::Display for FeedOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_text() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), *ty);
        }
    }

    #[test]
    fn unknown_reaction_is_validation_error() {
        let err = "love".parse::<ReactionType>().unwrap_err();
        assert!(matches!(err, PaperGraphError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: invalid reaction type: love");
    }

    #[test]
    fn only_like_and_share_drive_stats() {
        assert_eq!(ReactionType::Like.stat_field(), Some(StatField::LikeCount));
        assert_eq!(ReactionType::Share.stat_field(), Some(StatField::ShareCount));
        assert_eq!(ReactionType::Agree.stat_field(), None);
        assert_eq!(ReactionType::Disagree.stat_field(), None);
        assert_eq!(ReactionType::Biased.stat_field(), None);
    }

    #[test]
    fn feed_order_falls_back_to_recent() {
        assert_eq!(FeedOrder::parse("like"), FeedOrder::Likes);
        assert_eq!(FeedOrder::parse("suggest"), FeedOrder::Suggestion);
        assert_eq!(FeedOrder::parse("unknown"), FeedOrder::Recent);
        assert_eq!(FeedOrder::parse(""), FeedOrder::Recent);
    }

    #[test]
    fn feed_order_rejects_aliases_and_padding() {
        assert_eq!(FeedOrder::parse("likes"), FeedOrder::Recent);
        assert_eq!(FeedOrder::parse("suggestion"), FeedOrder::Recent);
        assert_eq!(FeedOrder::parse(" like "), FeedOrder::Recent);
        assert_eq!(FeedOrder::parse("LIKE"), FeedOrder::Recent);
    }

    #[test]
    fn score_bands_split_at_eight_six_and_four() {
        assert_eq!(ScoreBand::of(10.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::of(8.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::of(7.99), ScoreBand::Good);
        assert_eq!(ScoreBand::of(6.0), ScoreBand::Good);
        assert_eq!(ScoreBand::of(4.0), ScoreBand::Average);
        assert_eq!(ScoreBand::of(3.9), ScoreBand::Poor);
        assert_eq!(ScoreBand::of(0.0), ScoreBand::Poor);
    }

    #[test]
    fn visibility_defaults_to_public() {
        assert_eq!(Visibility::default(), Visibility::Public);
    }

    #[test]
    fn serde_uses_column_text() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
