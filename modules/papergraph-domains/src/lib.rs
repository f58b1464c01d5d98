//! Services for the papergraph social core.
//!
//! Every service holds an `Arc<dyn Store>` handed in at construction. Business
//! rules (thresholds, no-op cases, ownership, validation) live here; the store
//! only persists units of work.

pub mod activity;
pub mod analysis;
pub mod badges;
pub mod comments;
pub mod evaluations;
pub mod feed;
pub mod reactions;
pub mod services;
pub mod social;
pub mod stats;
pub mod subscriptions;

pub use activity::{ActivityLog, ActivityQuery, CreateActivity};
pub use analysis::{AnalysisDocument, AnalysisTasks};
pub use badges::{BadgeEngine, BadgeKind, ReconcileReport};
pub use comments::Comments;
pub use evaluations::{EvaluationDraft, Evaluations};
pub use feed::FeedComposer;
pub use reactions::ReactionLedger;
pub use services::Services;
pub use social::SocialGraph;
pub use stats::StatsStore;
pub use subscriptions::SubscriptionRewards;
