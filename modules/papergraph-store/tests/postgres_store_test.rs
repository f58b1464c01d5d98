//! Integration tests for PgStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.
//!
//! Tests share one database, so each one works on its own freshly minted
//! user ids instead of truncating tables.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use papergraph_common::{
    ActivityFilter, BadgeCategory, EvaluationScores, EventType, FeedOrder, NewActivity,
    NewBadgeTemplate, NewComment, NewDimension, NewEvaluation, NewMetric, Page, PaperGraphError,
    ReactionType, ScoreBand, StatField, TargetType, TaskCompletion, Visibility,
};
use papergraph_store::{
    ActivityRepository, BadgeRepository, CommentRepository, EvaluationRepository,
    FollowRepository, PgStore, ReactionChange, ReactionRepository, StatsRepository,
    TaskRepository,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgStore::new(pool);
    store.migrate().await.ok()?;
    Some(store)
}

/// A user id no other test run has touched.
fn fresh_user() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(0);
    let base = chrono::Utc::now().timestamp_micros() * 100;
    base + NEXT.fetch_add(1, Ordering::SeqCst)
}

fn template(badge_type: &str) -> NewBadgeTemplate {
    NewBadgeTemplate {
        badge_type: badge_type.to_string(),
        name: "Test Badge".to_string(),
        description: "awarded in tests".to_string(),
        icon: format!("/badges/{badge_type}.png"),
        condition: "never".to_string(),
        level: 1,
        category: BadgeCategory::Analysis,
    }
}

async fn completed_public_task(store: &PgStore, user: i64, suggest_score: i32) -> i64 {
    let task = store.create_task(user, 1).await.unwrap();
    store.set_task_public(task.id, true).await.unwrap();
    store
        .complete_task(TaskCompletion {
            task_id: task.id,
            content: serde_json::json!({"summary": "ok"}),
            suggest_score,
            activity: NewActivity::new(user, EventType::AnalysisCompleted, TargetType::Task, task.id),
        })
        .await
        .unwrap();
    task.id
}

fn like_change(fan: i64, owner: i64, task_id: i64) -> ReactionChange {
    ReactionChange {
        user_id: fan,
        task_id,
        reaction_type: ReactionType::Like,
        credit: Some((owner, StatField::LikeCount)),
        adjust_task_likes: true,
        on_add: NewActivity::new(fan, EventType::React, TargetType::Task, task_id),
        on_remove: NewActivity::new(fan, EventType::Unreact, TargetType::Task, task_id),
    }
}

async fn live_like_rows(store: &PgStore, fan: i64, task_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM task_reactions
        WHERE user_id = $1 AND task_id = $2 AND reaction_type = 'like' AND deleted_at IS NULL
        "#,
    )
    .bind(fan)
    .bind(task_id)
    .fetch_one(store.pool())
    .await
    .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn stat_deltas_floor_at_zero() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();

    let stats = store.get_or_create_stats(user).await.unwrap();
    assert_eq!(stats.like_count, 0);

    store.apply_stat_delta(user, StatField::LikeCount, 2).await.unwrap();
    let stats = store
        .apply_stat_delta(user, StatField::LikeCount, -5)
        .await
        .unwrap();
    assert_eq!(stats.like_count, 0);

    assert!(store.tombstone_stats(user).await.unwrap());
    assert!(!store.stats_user_ids().await.unwrap().contains(&user));
    let revived = store.get_or_create_stats(user).await.unwrap();
    assert!(revived.deleted_at.is_none());
}

#[tokio::test]
async fn award_badge_is_once_per_type() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    let badge_type = format!("test_badge_{user}");

    let seeded = store.seed_badge_templates(&[template(&badge_type)]).await.unwrap();
    assert_eq!(seeded, 1);
    assert_eq!(store.seed_badge_templates(&[template(&badge_type)]).await.unwrap(), 0);

    let tpl = store.find_badge_template(&badge_type).await.unwrap().unwrap();
    let activity = NewActivity::new(user, EventType::BadgeEarned, TargetType::Badge, 0);

    let first = store.award_badge(user, &tpl, activity.clone()).await.unwrap();
    let badge = first.expect("first award inserts");
    assert!(store.award_badge(user, &tpl, activity).await.unwrap().is_none());

    let filter = ActivityFilter {
        user_id: Some(user),
        event_type: Some(EventType::BadgeEarned),
        ..Default::default()
    };
    let (items, total) = store.list_activities(&filter, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].activity.target_id, badge.id);
}

#[tokio::test]
async fn follow_and_unfollow_keep_counters_paired() {
    let Some(store) = test_store().await else {
        return;
    };
    let (a, b) = (fresh_user(), fresh_user());
    let activity = NewActivity::new(a, EventType::FollowUser, TargetType::User, b);

    assert!(store.insert_follow(a, b, activity.clone()).await.unwrap().is_some());
    assert!(store.insert_follow(a, b, activity).await.unwrap().is_none());
    assert_eq!(store.get_or_create_stats(a).await.unwrap().following_count, 1);
    assert_eq!(store.get_or_create_stats(b).await.unwrap().follower_count, 1);

    assert!(store.remove_follow(a, b, None).await.unwrap().is_some());
    assert!(store.remove_follow(a, b, None).await.unwrap().is_none());
    assert_eq!(store.get_or_create_stats(a).await.unwrap().following_count, 0);
    assert_eq!(store.get_or_create_stats(b).await.unwrap().follower_count, 0);
    assert!(store.list_following(a, Page::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn reaction_toggle_round_trips() {
    let Some(store) = test_store().await else {
        return;
    };
    let (owner, fan) = (fresh_user(), fresh_user());
    let task_id = completed_public_task(&store, owner, 10).await;

    let change = like_change(fan, owner, task_id);

    assert!(store.toggle_reaction(change.clone()).await.unwrap().is_active());
    assert_eq!(store.get_or_create_stats(owner).await.unwrap().like_count, 1);
    assert_eq!(store.find_task(task_id).await.unwrap().unwrap().like_count, 1);

    assert!(!store.toggle_reaction(change).await.unwrap().is_active());
    assert_eq!(store.get_or_create_stats(owner).await.unwrap().like_count, 0);
    assert!(store
        .find_reaction(fan, task_id, ReactionType::Like)
        .await
        .unwrap()
        .is_none());
    assert!(store.reaction_counts(task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn completing_twice_is_rejected() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    let task_id = completed_public_task(&store, user, 3).await;

    let err = store
        .complete_task(TaskCompletion {
            task_id,
            content: serde_json::json!({}),
            suggest_score: 3,
            activity: NewActivity::new(user, EventType::AnalysisCompleted, TargetType::Task, task_id),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));

    let stats = store.get_or_create_stats(user).await.unwrap();
    assert_eq!(stats.analysis_count, 1);
    assert_eq!(stats.public_analysis_count, 1);
}

#[tokio::test]
async fn public_feed_orders_by_suggestion() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    let low = completed_public_task(&store, user, 1_000_001).await;
    let high = completed_public_task(&store, user, 1_000_002).await;

    let feed = store
        .public_feed(FeedOrder::Suggestion, Page::new(2, 0))
        .await
        .unwrap();
    let ids: Vec<i64> = feed.iter().map(|f| f.task.id).collect();
    assert_eq!(ids, vec![high, low]);
}

#[tokio::test]
async fn friends_only_activity_needs_follow_back() {
    let Some(store) = test_store().await else {
        return;
    };
    let (viewer, author) = (fresh_user(), fresh_user());
    store
        .append_activity(
            NewActivity::new(author, EventType::PaperShared, TargetType::Paper, 1)
                .with_visibility(Visibility::Friends),
        )
        .await
        .unwrap();

    let feed = store.activity_feed(viewer, &[author], Page::default()).await.unwrap();
    assert!(feed.is_empty());

    store
        .insert_follow(
            author,
            viewer,
            NewActivity::new(author, EventType::FollowUser, TargetType::User, viewer),
        )
        .await
        .unwrap();
    let feed = store.activity_feed(viewer, &[author], Page::default()).await.unwrap();
    // the share plus the follow_user activity
    assert_eq!(feed.len(), 2);
}

#[tokio::test]
async fn comments_list_oldest_first() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    let task_id = completed_public_task(&store, user, 0).await;

    for text in ["first", "second"] {
        store
            .insert_comment(
                NewComment {
                    task_id,
                    user_id: user,
                    content: text.to_string(),
                    parent_id: None,
                },
                NewActivity::new(user, EventType::CommentCreated, TargetType::Comment, 0),
            )
            .await
            .unwrap();
    }

    let comments = store.list_comments(task_id).await.unwrap();
    let texts: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(store.get_or_create_stats(user).await.unwrap().comment_count, 2);
}

#[tokio::test]
async fn reaction_losing_an_insert_race_reads_as_reacted() {
    let Some(store) = test_store().await else {
        return;
    };
    let (owner, fan) = (fresh_user(), fresh_user());
    let task_id = completed_public_task(&store, owner, 0).await;

    // A competing writer holds an uncommitted like from the same user.
    let mut rival = store.pool().begin().await.unwrap();
    sqlx::query(
        "INSERT INTO task_reactions (task_id, user_id, reaction_type) VALUES ($1, $2, 'like')",
    )
    .bind(task_id)
    .bind(fan)
    .execute(&mut *rival)
    .await
    .unwrap();
    sqlx::query("UPDATE analysis_tasks SET like_count = like_count + 1 WHERE id = $1")
        .bind(task_id)
        .execute(&mut *rival)
        .await
        .unwrap();

    let (toggled, committed) = tokio::join!(store.toggle_reaction(like_change(fan, owner, task_id)), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        rival.commit().await
    });
    committed.unwrap();

    let toggled = toggled.unwrap();
    assert!(toggled.is_active());
    assert_eq!(live_like_rows(&store, fan, task_id).await, 1);
    assert_eq!(store.find_task(task_id).await.unwrap().unwrap().like_count, 1);
    // The loser writes nothing of its own.
    assert_eq!(store.get_or_create_stats(owner).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn concurrent_identical_reactions_keep_counts_consistent() {
    let Some(store) = test_store().await else {
        return;
    };
    let (owner, fan) = (fresh_user(), fresh_user());
    let task_id = completed_public_task(&store, owner, 0).await;

    let (a, b) = tokio::join!(
        store.toggle_reaction(like_change(fan, owner, task_id)),
        store.toggle_reaction(like_change(fan, owner, task_id)),
    );
    a.unwrap();
    b.unwrap();

    // Whatever the interleaving, counters agree with the live rows.
    let live = live_like_rows(&store, fan, task_id).await;
    assert!(live <= 1);
    assert_eq!(store.find_task(task_id).await.unwrap().unwrap().like_count, live);
    assert_eq!(store.get_or_create_stats(owner).await.unwrap().like_count, live);
}

#[tokio::test]
async fn parallel_stat_deltas_add_up() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    store.get_or_create_stats(user).await.unwrap();

    const WRITERS: i64 = 25;
    let mut writers = tokio::task::JoinSet::new();
    for _ in 0..WRITERS {
        let store = store.clone();
        writers.spawn(async move { store.apply_stat_delta(user, StatField::ShareCount, 1).await });
    }
    while let Some(done) = writers.join_next().await {
        done.unwrap().unwrap();
    }

    let stats = store.get_or_create_stats(user).await.unwrap();
    assert_eq!(stats.share_count, WRITERS);
}

#[tokio::test]
async fn replies_must_target_a_live_comment_on_the_same_task() {
    let Some(store) = test_store().await else {
        return;
    };
    let user = fresh_user();
    let task_a = completed_public_task(&store, user, 0).await;
    let task_b = completed_public_task(&store, user, 0).await;
    let activity = || NewActivity::new(user, EventType::CommentReplied, TargetType::Comment, 0);
    let comment = |task_id: i64, parent_id: Option<i64>| NewComment {
        task_id,
        user_id: user,
        content: "reply".to_string(),
        parent_id,
    };

    let root = store.insert_comment(comment(task_a, None), activity()).await.unwrap();
    let err = store
        .insert_comment(comment(task_b, Some(root.id)), activity())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    sqlx::query("UPDATE comments SET deleted_at = now() WHERE id = $1")
        .bind(root.id)
        .execute(store.pool())
        .await
        .unwrap();
    let err = store
        .insert_comment(comment(task_a, Some(root.id)), activity())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.get_or_create_stats(user).await.unwrap().comment_count, 1);
}

fn evaluation(user: i64, paper_id: i64, overall_score: f64, summary: &str) -> NewEvaluation {
    NewEvaluation {
        user_id: user,
        paper_id,
        analysis_id: None,
        overall_score,
        summary: summary.to_string(),
        recommendation: String::new(),
        scores: EvaluationScores::default(),
        is_public: true,
        dimensions: vec![NewDimension {
            dimension_key: "evidence".to_string(),
            dimension_name: "Evidence".to_string(),
            score: overall_score,
            description: String::new(),
            evidence: format!("notes for paper {paper_id}"),
            metrics: vec![NewMetric {
                metric_key: "data".to_string(),
                metric_name: "Data support".to_string(),
                score: overall_score,
                description: String::new(),
                evidence: String::new(),
            }],
        }],
    }
}

#[tokio::test]
async fn evaluations_round_trip_with_likes_and_statistics() {
    let Some(store) = test_store().await else {
        return;
    };
    let (author, fan) = (fresh_user(), fresh_user());
    let paper_id = fresh_user();
    let created_activity = || NewActivity::new(author, EventType::EvaluationCreated, TargetType::Evaluation, 0);

    let high = store
        .insert_evaluation(evaluation(author, paper_id, 8.5, "100% convincing"), created_activity())
        .await
        .unwrap();
    store
        .insert_evaluation(evaluation(author, paper_id, 3.0, "weak"), created_activity())
        .await
        .unwrap();

    let loaded = store.find_evaluation(high.evaluation.id).await.unwrap().unwrap();
    assert_eq!(loaded.dimensions.len(), 1);
    assert_eq!(loaded.dimensions[0].metrics.len(), 1);

    let like = || NewActivity::new(fan, EventType::EvaluationLiked, TargetType::Evaluation, high.evaluation.id);
    let liked = store.toggle_evaluation_like(high.evaluation.id, fan, like()).await.unwrap();
    assert!(liked.liked);
    assert_eq!(liked.like_count, 1);
    let unliked = store.toggle_evaluation_like(high.evaluation.id, fan, like()).await.unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.like_count, 0);

    let stats = store.evaluation_statistics(paper_id).await.unwrap();
    assert_eq!(stats.total_evaluations, 2);
    assert!((stats.avg_overall_score - 5.75).abs() < 1e-9);
    assert_eq!(stats.score_distribution[&ScoreBand::Excellent], 1);
    assert_eq!(stats.score_distribution[&ScoreBand::Poor], 1);
    assert_eq!(stats.score_distribution[&ScoreBand::Good], 0);

    // `%` is matched literally, not as a wildcard.
    let (found, total) = store.search_evaluations("100%", Page::default()).await.unwrap();
    assert!(total >= 1);
    assert!(found.iter().any(|e| e.id == high.evaluation.id));
    let (found, _) = store
        .search_evaluations(&format!("notes for paper {paper_id}"), Page::default())
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, high.evaluation.id);

    assert!(store.tombstone_evaluation(high.evaluation.id).await.unwrap());
    assert!(store.find_evaluation(high.evaluation.id).await.unwrap().is_none());
    let err = store
        .toggle_evaluation_like(high.evaluation.id, fan, like())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
