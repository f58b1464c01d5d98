//! The fixed badge catalog and the stat thresholds that unlock each badge.

use papergraph_common::{BadgeCategory, NewBadgeTemplate, PaperGraphError, StatField};

/// A stat dimension and the minimum value that qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeRule {
    pub field: StatField,
    pub threshold: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeKind {
    FirstAnalysis,
    AnalysisExplorer,
    AnalysisMaster,
    AnalysisLegend,
    PopularAnalyst,
    SuperstarAnalyst,
    RisingStar,
    SocialButterfly,
    ActiveCommentator,
    KnowledgeSharer,
    GenerousSharer,
    PremiumMember,
    EnterpriseUser,
}

impl BadgeKind {
    pub const ALL: [BadgeKind; 13] = [
        BadgeKind::FirstAnalysis,
        BadgeKind::AnalysisExplorer,
        BadgeKind::AnalysisMaster,
        BadgeKind::AnalysisLegend,
        BadgeKind::PopularAnalyst,
        BadgeKind::SuperstarAnalyst,
        BadgeKind::RisingStar,
        BadgeKind::SocialButterfly,
        BadgeKind::ActiveCommentator,
        BadgeKind::KnowledgeSharer,
        BadgeKind::GenerousSharer,
        BadgeKind::PremiumMember,
        BadgeKind::EnterpriseUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeKind::FirstAnalysis => "first_analysis",
            BadgeKind::AnalysisExplorer => "analysis_explorer",
            BadgeKind::AnalysisMaster => "analysis_master",
            BadgeKind::AnalysisLegend => "analysis_legend",
            BadgeKind::PopularAnalyst => "popular_analyst",
            BadgeKind::SuperstarAnalyst => "superstar_analyst",
            BadgeKind::RisingStar => "rising_star",
            BadgeKind::SocialButterfly => "social_butterfly",
            BadgeKind::ActiveCommentator => "active_commentator",
            BadgeKind::KnowledgeSharer => "knowledge_sharer",
            BadgeKind::GenerousSharer => "generous_sharer",
            BadgeKind::PremiumMember => "premium_member",
            BadgeKind::EnterpriseUser => "enterprise_user",
        }
    }

    /// Threshold rule for stat-driven badges. Subscription badges have none;
    /// they are only awarded through the subscription trigger.
    pub fn rule(&self) -> Option<BadgeRule> {
        let (field, threshold) = match self {
            BadgeKind::FirstAnalysis => (StatField::AnalysisCount, 1),
            BadgeKind::AnalysisExplorer => (StatField::AnalysisCount, 10),
            BadgeKind::AnalysisMaster => (StatField::AnalysisCount, 50),
            BadgeKind::AnalysisLegend => (StatField::AnalysisCount, 100),
            BadgeKind::PopularAnalyst => (StatField::LikeCount, 10),
            BadgeKind::SuperstarAnalyst => (StatField::LikeCount, 100),
            BadgeKind::RisingStar => (StatField::FollowerCount, 10),
            BadgeKind::SocialButterfly => (StatField::FollowingCount, 20),
            BadgeKind::ActiveCommentator => (StatField::CommentCount, 20),
            BadgeKind::KnowledgeSharer => (StatField::PublicAnalysisCount, 5),
            BadgeKind::GenerousSharer => (StatField::ShareCount, 5),
            BadgeKind::PremiumMember | BadgeKind::EnterpriseUser => return None,
        };
        Some(BadgeRule { field, threshold })
    }

    /// Subscription product name to badge. Unknown products earn nothing.
    pub fn for_product(product: &str) -> Option<BadgeKind> {
        match product.trim() {
            "企业版" => Some(BadgeKind::EnterpriseUser),
            "专业版" => Some(BadgeKind::PremiumMember),
            _ => None,
        }
    }

    fn template(&self) -> NewBadgeTemplate {
        let (name, description, condition, level, category) = match self {
            BadgeKind::FirstAnalysis => (
                "First Analysis",
                "Completed a first paper analysis",
                "Complete 1 paper analysis",
                1,
                BadgeCategory::Analysis,
            ),
            BadgeKind::AnalysisExplorer => (
                "Analysis Explorer",
                "Completed 10 paper analyses",
                "Complete 10 paper analyses",
                2,
                BadgeCategory::Analysis,
            ),
            BadgeKind::AnalysisMaster => (
                "Analysis Master",
                "Completed 50 paper analyses",
                "Complete 50 paper analyses",
                3,
                BadgeCategory::Analysis,
            ),
            BadgeKind::AnalysisLegend => (
                "Analysis Legend",
                "Completed 100 paper analyses",
                "Complete 100 paper analyses",
                4,
                BadgeCategory::Analysis,
            ),
            BadgeKind::PopularAnalyst => (
                "Popular Analyst",
                "Analyses received 10 likes",
                "Receive 10 likes",
                2,
                BadgeCategory::Social,
            ),
            BadgeKind::SuperstarAnalyst => (
                "Superstar Analyst",
                "Analyses received 100 likes",
                "Receive 100 likes",
                3,
                BadgeCategory::Social,
            ),
            BadgeKind::RisingStar => (
                "Rising Star",
                "Gained 10 followers",
                "Gain 10 followers",
                2,
                BadgeCategory::Social,
            ),
            BadgeKind::SocialButterfly => (
                "Social Butterfly",
                "Followed 20 users",
                "Follow 20 users",
                2,
                BadgeCategory::Social,
            ),
            BadgeKind::ActiveCommentator => (
                "Active Commentator",
                "Posted 20 comments",
                "Post 20 comments",
                2,
                BadgeCategory::Social,
            ),
            BadgeKind::KnowledgeSharer => (
                "Knowledge Sharer",
                "Published 5 paper analyses",
                "Make 5 analyses public",
                2,
                BadgeCategory::Sharing,
            ),
            BadgeKind::GenerousSharer => (
                "Generous Sharer",
                "Shared analysis results 5 times",
                "Share 5 analyses",
                2,
                BadgeCategory::Sharing,
            ),
            BadgeKind::PremiumMember => (
                "Premium Member",
                "Subscribed to the professional or enterprise plan",
                "Subscribe to a paid plan",
                2,
                BadgeCategory::Subscription,
            ),
            BadgeKind::EnterpriseUser => (
                "Enterprise User",
                "Subscribed to the enterprise plan",
                "Subscribe to the enterprise plan",
                3,
                BadgeCategory::Subscription,
            ),
        };

        NewBadgeTemplate {
            badge_type: self.as_str().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: format!("/badges/{}.png", self.as_str()),
            condition: condition.to_string(),
            level,
            category,
        }
    }
}

impl std::fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BadgeKind {
    type Err = PaperGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BadgeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PaperGraphError::validation(format!("invalid badge type: {s}")))
    }
}

/// The thirteen templates seeded on first start.
pub fn default_catalog() -> Vec<NewBadgeTemplate> {
    BadgeKind::ALL.iter().map(BadgeKind::template).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_every_kind_once() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 13);
        let mut types: Vec<_> = catalog.iter().map(|t| t.badge_type.clone()).collect();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), 13);
    }

    #[test]
    fn subscription_badges_have_no_stat_rule() {
        for kind in BadgeKind::ALL {
            let is_subscription = kind.template().category == BadgeCategory::Subscription;
            assert_eq!(kind.rule().is_none(), is_subscription, "{kind}");
        }
    }

    #[test]
    fn analysis_thresholds_ascend_with_level() {
        let analysis: Vec<_> = BadgeKind::ALL
            .iter()
            .filter_map(|k| k.rule().filter(|r| r.field == StatField::AnalysisCount))
            .map(|r| r.threshold)
            .collect();
        assert_eq!(analysis, vec![1, 10, 50, 100]);
    }

    #[test]
    fn product_mapping() {
        assert_eq!(BadgeKind::for_product("企业版"), Some(BadgeKind::EnterpriseUser));
        assert_eq!(BadgeKind::for_product("专业版"), Some(BadgeKind::PremiumMember));
        assert_eq!(BadgeKind::for_product("免费版"), None);
        assert_eq!(BadgeKind::for_product(""), None);
    }

    #[test]
    fn parses_from_type_key() {
        assert_eq!(
            "rising_star".parse::<BadgeKind>().unwrap(),
            BadgeKind::RisingStar
        );
        assert!("gold_star".parse::<BadgeKind>().is_err());
    }
}
