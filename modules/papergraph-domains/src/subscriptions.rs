use papergraph_common::{UserBadge, UserId};
use tracing::{info, warn};

use crate::badges::BadgeEngine;

/// Hook called by the billing flow once a subscription is active.
#[derive(Clone)]
pub struct SubscriptionRewards {
    badges: BadgeEngine,
}

impl SubscriptionRewards {
    pub fn new(badges: BadgeEngine) -> Self {
        Self { badges }
    }

    /// Never fails the purchase. Award errors are logged and picked up by a
    /// later retry of the same call.
    pub async fn on_subscription_activated(&self, user_id: UserId, product: &str) -> Option<UserBadge> {
        match self.badges.award_subscription_badge(user_id, product).await {
            Ok(Some(badge)) => {
                info!(user_id, product, badge_type = %badge.badge_type, "subscription badge awarded");
                Some(badge)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, product, error = %e, "subscription badge award failed");
                None
            }
        }
    }
}
