use std::sync::Arc;

use papergraph_common::{FeedActivity, FeedAnalysis, FeedOrder, Page, Result, UserId};
use papergraph_store::Store;
use tracing::debug;

/// Builds personal and public timelines.
#[derive(Clone)]
pub struct FeedComposer {
    store: Arc<dyn Store>,
}

impl FeedComposer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The user plus everyone they follow.
    pub async fn audience(&self, user_id: UserId) -> Result<Vec<UserId>> {
        let mut audience = self.store.following_ids(user_id).await?;
        if !audience.contains(&user_id) {
            audience.push(user_id);
        }
        Ok(audience)
    }

    pub async fn get_user_activity_feed(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<FeedActivity>> {
        let audience = self.audience(user_id).await?;
        debug!(user_id, audience = audience.len(), "composing activity feed");
        self.store.activity_feed(user_id, &audience, page).await
    }

    /// Public, completed analyses from the audience set.
    pub async fn get_user_analysis_feed(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<FeedAnalysis>> {
        let audience = self.audience(user_id).await?;
        debug!(user_id, audience = audience.len(), "composing analysis feed");
        self.store.analysis_feed(&audience, page).await
    }

    /// Every public, completed analysis. `order_by` is "like", "suggest", or
    /// anything else for most recently completed first.
    pub async fn get_public_feed(&self, order_by: &str, page: Page) -> Result<Vec<FeedAnalysis>> {
        self.store
            .public_feed(FeedOrder::parse(order_by), page)
            .await
    }
}
