//! Analysis task lifecycle and comments over the in-memory store.

mod common;

use papergraph_common::{PaperGraphError, TaskStatus};
use papergraph_domains::analysis::MAX_ACTIVE_TASKS;

use common::{completed_task, document, setup};

#[tokio::test]
async fn completion_records_result_stats_and_badge() {
    let (_, services) = setup().await;
    let task = services.tasks.create(1, 77).await.unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    let done = services
        .tasks
        .complete(task.id, &document("Attention Is All You Need", 4))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.finished_at.is_some());
    assert_eq!(done.suggest_score, 28);

    let result = services.tasks.get_result(task.id).await.unwrap().unwrap();
    assert_eq!(
        result.content["basicInfo"]["title"],
        "Attention Is All You Need"
    );

    let stats = services.stats.get_or_create(1).await.unwrap();
    assert_eq!(stats.analysis_count, 1);
    assert_eq!(stats.public_analysis_count, 0);

    let badges = services.badges.get_user_badges(1).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].badge_type, "first_analysis");
}

#[tokio::test]
async fn only_in_progress_tasks_transition() {
    let (_, services) = setup().await;
    let task_id = completed_task(&services, 1, 3, false).await;

    let err = services
        .tasks
        .complete(task_id, &document("again", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));
    assert!(matches!(
        services.tasks.fail(task_id).await.unwrap_err(),
        PaperGraphError::Validation(_)
    ));
    assert_eq!(services.stats.get_or_create(1).await.unwrap().analysis_count, 1);

    let failing = services.tasks.create(1, 8).await.unwrap();
    let failed = services.tasks.fail(failing.id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(services.tasks.get(999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn invalid_document_is_rejected_before_writing() {
    let (_, services) = setup().await;
    let task = services.tasks.create(1, 1).await.unwrap();

    let err = services
        .tasks
        .complete(task.id, &document("bad", 9))
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));
    assert_eq!(
        services.tasks.get(task.id).await.unwrap().status,
        TaskStatus::InProgress
    );
    assert!(services.tasks.get_result(task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn public_flag_is_owner_only_and_drives_public_count() {
    let (_, services) = setup().await;
    let task_id = completed_task(&services, 1, 3, false).await;

    let err = services.tasks.set_public(2, task_id, true).await.unwrap_err();
    assert!(matches!(err, PaperGraphError::Forbidden(_)));

    services.tasks.set_public(1, task_id, true).await.unwrap();
    services.tasks.set_public(1, task_id, true).await.unwrap();
    assert_eq!(
        services.stats.get_or_create(1).await.unwrap().public_analysis_count,
        1
    );

    services.tasks.set_public(1, task_id, false).await.unwrap();
    assert_eq!(
        services.stats.get_or_create(1).await.unwrap().public_analysis_count,
        0
    );
}

#[tokio::test]
async fn public_before_completion_counts_on_completion() {
    let (_, services) = setup().await;
    completed_task(&services, 1, 3, true).await;
    let stats = services.stats.get_or_create(1).await.unwrap();
    assert_eq!(stats.analysis_count, 1);
    assert_eq!(stats.public_analysis_count, 1);
}

#[tokio::test]
async fn active_tasks_are_capped() {
    let (_, services) = setup().await;
    let mut created = Vec::new();
    for paper in 0..3 {
        created.push(services.tasks.create(1, paper).await.unwrap().id);
    }
    completed_task(&services, 1, 3, false).await;

    let active = services.tasks.get_active_tasks(1).await.unwrap();
    assert_eq!(active.len() as i64, MAX_ACTIVE_TASKS);
    let ids: Vec<i64> = active.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![created[2], created[1]]);

    let all = services
        .tasks
        .get_user_tasks(1, papergraph_common::Page::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn comments_thread_and_count() {
    let (_, services) = setup().await;
    let task_id = completed_task(&services, 1, 3, true).await;

    let root = services
        .comments
        .add(2, task_id, "  Solid methodology  ", None)
        .await
        .unwrap();
    assert_eq!(root.content, "Solid methodology");
    let reply = services
        .comments
        .add(1, task_id, "Thanks", Some(root.id))
        .await
        .unwrap();
    assert_eq!(reply.parent_id, Some(root.id));

    let listed: Vec<i64> = services
        .comments
        .list(task_id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed, vec![root.id, reply.id]);
    assert_eq!(services.stats.get_or_create(2).await.unwrap().comment_count, 1);
}

#[tokio::test]
async fn comment_validation() {
    let (_, services) = setup().await;
    let task_id = completed_task(&services, 1, 3, true).await;
    let other_task = completed_task(&services, 1, 3, true).await;
    let elsewhere = services
        .comments
        .add(2, other_task, "hi", None)
        .await
        .unwrap();

    let err = services.comments.add(2, task_id, "   ", None).await.unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));
    assert!(services
        .comments
        .add(2, 999, "hello", None)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(services
        .comments
        .add(2, task_id, "reply", Some(elsewhere.id))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(services.comments.list(task_id).await.unwrap().is_empty());
}
