use std::sync::Arc;

use papergraph_common::{
    EventType, NewActivity, Page, Result, TargetType, UserFollow, UserId, Visibility,
};
use papergraph_store::Store;
use tracing::{debug, info};

use crate::badges::BadgeEngine;

/// Directed follow edges and the follower/following counters they drive.
#[derive(Clone)]
pub struct SocialGraph {
    store: Arc<dyn Store>,
    badges: BadgeEngine,
}

impl SocialGraph {
    pub fn new(store: Arc<dyn Store>, badges: BadgeEngine) -> Self {
        Self { store, badges }
    }

    /// Returns the new edge, or `None` when nothing changed (self-follow or
    /// an existing edge). Both are successful no-ops.
    pub async fn follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
    ) -> Result<Option<UserFollow>> {
        if follower_id == following_id {
            debug!(user_id = follower_id, "self-follow ignored");
            return Ok(None);
        }

        let activity = NewActivity::new(
            follower_id,
            EventType::FollowUser,
            TargetType::User,
            following_id,
        )
        .with_title("followed a user");

        let edge = self
            .store
            .insert_follow(follower_id, following_id, activity)
            .await?;

        match &edge {
            Some(_) => {
                info!(follower_id, following_id, "user followed");
                self.badges.evaluate_logged(follower_id).await;
                self.badges.evaluate_logged(following_id).await;
            }
            None => debug!(follower_id, following_id, "already following"),
        }
        Ok(edge)
    }

    /// Returns whether an edge was removed. Missing edges are a no-op.
    pub async fn unfollow(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        if follower_id == following_id {
            return Ok(false);
        }

        let activity = NewActivity::new(
            follower_id,
            EventType::UnfollowUser,
            TargetType::User,
            following_id,
        )
        .with_title("unfollowed a user")
        .with_visibility(Visibility::Private);

        let removed = self
            .store
            .remove_follow(follower_id, following_id, Some(activity))
            .await?
            .is_some();

        if removed {
            info!(follower_id, following_id, "user unfollowed");
        } else {
            debug!(follower_id, following_id, "not following, nothing to remove");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        self.store.is_following(follower_id, following_id).await
    }

    /// Users `user_id` follows, newest edge first.
    pub async fn get_following(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        self.store.list_following(user_id, page).await
    }

    /// Users following `user_id`, newest edge first.
    pub async fn get_followers(&self, user_id: UserId, page: Page) -> Result<Vec<UserFollow>> {
        self.store.list_followers(user_id, page).await
    }
}
