use std::sync::Arc;

use papergraph_common::{Result, StatField, UserId, UserStats};
use papergraph_store::Store;

/// Per-user aggregate counters. Thin by design: every write is a single
/// additive, floored column update performed by the store.
#[derive(Clone)]
pub struct StatsStore {
    store: Arc<dyn Store>,
}

impl StatsStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_or_create(&self, user_id: UserId) -> Result<UserStats> {
        self.store.get_or_create_stats(user_id).await
    }

    pub async fn apply_delta(
        &self,
        user_id: UserId,
        field: StatField,
        delta: i64,
    ) -> Result<UserStats> {
        if delta == 0 {
            return self.get_or_create(user_id).await;
        }
        let stats = self.store.apply_stat_delta(user_id, field, delta).await?;
        tracing::debug!(user_id, field = %field, delta, value = stats.get(field), "stat applied");
        Ok(stats)
    }

    /// Account removal. The row is hidden until the next `get_or_create`.
    pub async fn tombstone(&self, user_id: UserId) -> Result<bool> {
        let removed = self.store.tombstone_stats(user_id).await?;
        if removed {
            tracing::info!(user_id, "user stats tombstoned");
        }
        Ok(removed)
    }
}
