//! Follow graph behaviour over the in-memory store.

mod common;

use papergraph_common::{Page, PaperGraphError};

use common::setup;

#[tokio::test]
async fn following_twice_leaves_one_edge() {
    let (_, services) = setup().await;

    assert!(services.social.follow(1, 2).await.unwrap().is_some());
    assert!(services.social.follow(1, 2).await.unwrap().is_none());

    let following = services.social.get_following(1, Page::default()).await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(services.stats.get_or_create(1).await.unwrap().following_count, 1);
    assert_eq!(services.stats.get_or_create(2).await.unwrap().follower_count, 1);
    assert!(services.social.is_following(1, 2).await.unwrap());
    assert!(!services.social.is_following(2, 1).await.unwrap());
}

#[tokio::test]
async fn self_follow_is_a_no_op() {
    let (store, services) = setup().await;

    assert!(services.social.follow(3, 3).await.unwrap().is_none());
    assert!(services
        .social
        .get_following(3, Page::default())
        .await
        .unwrap()
        .is_empty());
    let stats = services.stats.get_or_create(3).await.unwrap();
    assert_eq!(stats.following_count, 0);
    assert_eq!(stats.follower_count, 0);
    assert_eq!(store.activity_row_count(), 0);
}

#[tokio::test]
async fn unfollow_mirrors_follow() {
    let (_, services) = setup().await;
    services.social.follow(1, 2).await.unwrap();

    assert!(services.social.unfollow(1, 2).await.unwrap());
    assert!(!services.social.unfollow(1, 2).await.unwrap());
    assert!(!services.social.is_following(1, 2).await.unwrap());
    assert!(services
        .social
        .get_followers(2, Page::default())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(services.stats.get_or_create(1).await.unwrap().following_count, 0);
    assert_eq!(services.stats.get_or_create(2).await.unwrap().follower_count, 0);

    // The tombstoned edge does not block a new one.
    assert!(services.social.follow(1, 2).await.unwrap().is_some());
    assert_eq!(services.stats.get_or_create(2).await.unwrap().follower_count, 1);
}

#[tokio::test]
async fn follower_lists_are_newest_first_and_paged() {
    let (_, services) = setup().await;
    for follower in [10, 11, 12] {
        services.social.follow(follower, 1).await.unwrap();
    }

    let followers = services.social.get_followers(1, Page::default()).await.unwrap();
    let ids: Vec<i64> = followers.iter().map(|f| f.follower_id).collect();
    assert_eq!(ids, vec![12, 11, 10]);

    let second = services.social.get_followers(1, Page::new(1, 1)).await.unwrap();
    assert_eq!(second[0].follower_id, 11);
}

#[tokio::test]
async fn failed_follow_writes_nothing() {
    let (store, services) = setup().await;

    store.fail_activity_writes(true);
    let err = services.social.follow(1, 2).await.unwrap_err();
    assert!(matches!(err, PaperGraphError::Database(_)));
    store.fail_activity_writes(false);

    assert!(!services.social.is_following(1, 2).await.unwrap());
    assert_eq!(services.stats.get_or_create(1).await.unwrap().following_count, 0);
    assert_eq!(services.stats.get_or_create(2).await.unwrap().follower_count, 0);
}

#[tokio::test]
async fn ten_followers_earn_rising_star() {
    let (_, services) = setup().await;
    for follower in 100..110 {
        services.social.follow(follower, 1).await.unwrap();
    }

    let badges = services.badges.get_user_badges(1).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].badge_type, "rising_star");
}
