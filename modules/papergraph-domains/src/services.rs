use std::sync::Arc;

use papergraph_common::{Author, Result};
use papergraph_store::Store;

use crate::{
    ActivityLog, AnalysisTasks, BadgeEngine, Comments, Evaluations, FeedComposer, ReactionLedger,
    SocialGraph, StatsStore, SubscriptionRewards,
};

/// Every service wired to one store.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub stats: StatsStore,
    pub badges: BadgeEngine,
    pub social: SocialGraph,
    pub reactions: ReactionLedger,
    pub activity: ActivityLog,
    pub feed: FeedComposer,
    pub tasks: AnalysisTasks,
    pub comments: Comments,
    pub evaluations: Evaluations,
    pub subscriptions: SubscriptionRewards,
}

impl Services {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let badges = BadgeEngine::new(store.clone());
        Self {
            stats: StatsStore::new(store.clone()),
            social: SocialGraph::new(store.clone(), badges.clone()),
            reactions: ReactionLedger::new(store.clone(), badges.clone()),
            activity: ActivityLog::new(store.clone()),
            feed: FeedComposer::new(store.clone()),
            tasks: AnalysisTasks::new(store.clone(), badges.clone()),
            comments: Comments::new(store.clone(), badges.clone()),
            evaluations: Evaluations::new(store.clone()),
            subscriptions: SubscriptionRewards::new(badges.clone()),
            badges,
            store,
        }
    }

    /// Register or refresh the author info shown in feeds.
    pub async fn upsert_user(&self, author: Author) -> Result<()> {
        self.store.upsert_user(author).await
    }
}
