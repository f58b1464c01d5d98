//! Paper evaluations over the in-memory store.

mod common;

use papergraph_common::{
    ActivityFilter, EvaluationScores, EvaluationUpdate, EventType, Page, PageRequest,
    PaperGraphError, ScoreBand, Visibility,
};
use papergraph_domains::evaluations::{DimensionDraft, MetricDraft};
use papergraph_domains::EvaluationDraft;
use papergraph_store::ActivityRepository;

use common::{completed_task, setup};

fn draft(user_id: i64, paper_id: i64, overall_score: f64, public: bool) -> EvaluationDraft {
    EvaluationDraft {
        user_id,
        paper_id,
        overall_score,
        summary: format!("paper {paper_id} scored {overall_score}"),
        is_public: public,
        ..Default::default()
    }
}

fn update_of(overall_score: f64, is_public: bool) -> EvaluationUpdate {
    EvaluationUpdate {
        overall_score,
        summary: "revised".to_string(),
        recommendation: String::new(),
        scores: EvaluationScores::default(),
        is_public,
    }
}

#[tokio::test]
async fn create_stores_dimensions_metrics_and_activity() {
    let (store, services) = setup().await;
    let detail = services
        .evaluations
        .create(EvaluationDraft {
            scores: EvaluationScores {
                logic_score: 8.5,
                ..Default::default()
            },
            dimensions: vec![
                DimensionDraft {
                    key: "logic".to_string(),
                    score: 8.5,
                    evidence: "consistent proofs".to_string(),
                    metrics: vec![
                        MetricDraft {
                            key: "coherence".to_string(),
                            score: 9.0,
                            ..Default::default()
                        },
                        MetricDraft {
                            key: "structure".to_string(),
                            score: 8.0,
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
                DimensionDraft {
                    key: "evidence".to_string(),
                    score: 6.0,
                    ..Default::default()
                },
            ],
            ..draft(1, 42, 8.2, true)
        })
        .await
        .unwrap();

    assert_eq!(detail.evaluation.band(), ScoreBand::Excellent);
    assert_eq!(detail.evaluation.recommendation, ScoreBand::Excellent.advice());
    assert_eq!(detail.dimensions.len(), 2);
    assert_eq!(detail.dimensions[0].dimension.dimension_name, "Logical rigor");
    assert_eq!(detail.dimensions[0].metrics.len(), 2);
    assert!(detail.dimensions[1].metrics.is_empty());

    let fetched = services.evaluations.get(detail.evaluation.id, 99).await.unwrap();
    assert_eq!(fetched, detail);

    let filter = ActivityFilter {
        user_id: Some(1),
        event_type: Some(EventType::EvaluationCreated),
        ..Default::default()
    };
    let (items, total) = store.list_activities(&filter, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].activity.target_id, detail.evaluation.id);
    assert_eq!(items[0].activity.visibility, Visibility::Public);
}

#[tokio::test]
async fn private_evaluations_are_hidden_from_others() {
    let (_, services) = setup().await;
    let private = services
        .evaluations
        .create(draft(1, 5, 6.0, false))
        .await
        .unwrap()
        .evaluation;

    assert!(services.evaluations.get(private.id, 1).await.is_ok());
    let err = services.evaluations.get(private.id, 2).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(services
        .evaluations
        .toggle_like(2, private.id)
        .await
        .unwrap_err()
        .is_not_found());

    let mine = services
        .evaluations
        .list_by_user(1, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    let public = services
        .evaluations
        .list_by_paper(5, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(public.total, 0);
}

#[tokio::test]
async fn only_the_author_can_update_or_delete() {
    let (store, services) = setup().await;
    let evaluation = services
        .evaluations
        .create(draft(1, 5, 5.0, true))
        .await
        .unwrap()
        .evaluation;

    let err = services
        .evaluations
        .update(2, evaluation.id, update_of(9.0, true))
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Forbidden(_)));
    let err = services.evaluations.delete(2, evaluation.id).await.unwrap_err();
    assert!(matches!(err, PaperGraphError::Forbidden(_)));

    let updated = services
        .evaluations
        .update(1, evaluation.id, update_of(9.0, false))
        .await
        .unwrap();
    assert_eq!(updated.overall_score, 9.0);
    assert_eq!(updated.summary, "revised");
    assert_eq!(updated.recommendation, ScoreBand::Excellent.advice());
    assert!(!updated.is_public);

    let filter = ActivityFilter {
        event_type: Some(EventType::EvaluationUpdated),
        ..Default::default()
    };
    let (items, _) = store.list_activities(&filter, Page::default()).await.unwrap();
    assert_eq!(items[0].activity.visibility, Visibility::Private);

    services.evaluations.delete(1, evaluation.id).await.unwrap();
    assert!(services
        .evaluations
        .get(evaluation.id, 1)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(services
        .evaluations
        .delete(1, evaluation.id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn update_rejects_out_of_range_scores() {
    let (_, services) = setup().await;
    let evaluation = services
        .evaluations
        .create(draft(1, 5, 5.0, true))
        .await
        .unwrap()
        .evaluation;

    let mut update = update_of(7.0, true);
    update.scores.method_score = 12.0;
    let err = services
        .evaluations
        .update(1, evaluation.id, update)
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));
    let unchanged = services.evaluations.get(evaluation.id, 1).await.unwrap();
    assert_eq!(unchanged.evaluation.overall_score, 5.0);
}

#[tokio::test]
async fn like_toggles_and_count_follows() {
    let (store, services) = setup().await;
    let id = services
        .evaluations
        .create(draft(1, 5, 7.0, true))
        .await
        .unwrap()
        .evaluation
        .id;

    let first = services.evaluations.toggle_like(2, id).await.unwrap();
    assert!(first.liked);
    assert_eq!(first.like_count, 1);
    let second = services.evaluations.toggle_like(3, id).await.unwrap();
    assert_eq!(second.like_count, 2);

    let undone = services.evaluations.toggle_like(2, id).await.unwrap();
    assert!(!undone.liked);
    assert_eq!(undone.like_count, 1);

    let filter = ActivityFilter {
        event_type: Some(EventType::EvaluationLiked),
        ..Default::default()
    };
    let (_, liked_events) = store.list_activities(&filter, Page::default()).await.unwrap();
    assert_eq!(liked_events, 2);
}

#[tokio::test]
async fn paper_listing_and_top_order_by_score() {
    let (_, services) = setup().await;
    let mid = services.evaluations.create(draft(1, 9, 6.5, true)).await.unwrap().evaluation.id;
    let best = services.evaluations.create(draft(2, 9, 9.0, true)).await.unwrap().evaluation.id;
    let low = services.evaluations.create(draft(3, 9, 2.0, true)).await.unwrap().evaluation.id;
    let other_paper = services.evaluations.create(draft(4, 10, 6.5, true)).await.unwrap().evaluation.id;
    services.evaluations.create(draft(5, 9, 10.0, false)).await.unwrap();

    let page = services
        .evaluations
        .list_by_paper(9, PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    let ids: Vec<i64> = page.items.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![best, mid]);

    // Equal scores fall back to likes.
    services.evaluations.toggle_like(7, other_paper).await.unwrap();
    let top = services.evaluations.top(3).await.unwrap();
    let ids: Vec<i64> = top.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![best, other_paper, mid]);

    // Limits clamp to 1..=100; private evaluations never appear.
    assert_eq!(services.evaluations.top(0).await.unwrap().len(), 1);
    let all = services.evaluations.top(500).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all.last().map(|e| e.id), Some(low));
    assert!(all.iter().all(|e| e.is_public));
}

#[tokio::test]
async fn statistics_bucket_public_scores() {
    let (_, services) = setup().await;
    for (user, score) in [(1, 9.0), (2, 8.0), (3, 6.5), (4, 3.5)] {
        services.evaluations.create(draft(user, 11, score, true)).await.unwrap();
    }
    services.evaluations.create(draft(5, 11, 1.0, false)).await.unwrap();

    let stats = services.evaluations.statistics(11).await.unwrap();
    assert_eq!(stats.total_evaluations, 4);
    assert!((stats.avg_overall_score - 6.75).abs() < 1e-9);
    assert_eq!(stats.score_distribution[&ScoreBand::Excellent], 2);
    assert_eq!(stats.score_distribution[&ScoreBand::Good], 1);
    assert_eq!(stats.score_distribution[&ScoreBand::Average], 0);
    assert_eq!(stats.score_distribution[&ScoreBand::Poor], 1);

    let empty = services.evaluations.statistics(12).await.unwrap();
    assert_eq!(empty.total_evaluations, 0);
    assert_eq!(empty.avg_overall_score, 0.0);
    assert_eq!(empty.score_distribution.len(), 4);
}

#[tokio::test]
async fn search_matches_text_and_dimension_notes() {
    let (_, services) = setup().await;
    let by_summary = services
        .evaluations
        .create(EvaluationDraft {
            summary: "Strong Transformer baseline".to_string(),
            ..draft(1, 3, 7.0, true)
        })
        .await
        .unwrap()
        .evaluation
        .id;
    let by_evidence = services
        .evaluations
        .create(EvaluationDraft {
            dimensions: vec![DimensionDraft {
                key: "evidence".to_string(),
                score: 8.0,
                evidence: "ablations on transformer depth".to_string(),
                ..Default::default()
            }],
            ..draft(2, 4, 8.0, true)
        })
        .await
        .unwrap()
        .evaluation
        .id;
    services
        .evaluations
        .create(EvaluationDraft {
            summary: "transformer, but private".to_string(),
            ..draft(3, 5, 9.0, false)
        })
        .await
        .unwrap();

    let found = services
        .evaluations
        .search("  TRANSFORMER ", PageRequest::default())
        .await
        .unwrap();
    let ids: Vec<i64> = found.items.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![by_evidence, by_summary]);
    assert_eq!(found.total, 2);

    let err = services
        .evaluations
        .search("   ", PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Validation(_)));
}

#[tokio::test]
async fn evaluations_attach_only_to_the_authors_analysis() {
    let (_, services) = setup().await;
    let task_id = completed_task(&services, 1, 4, true).await;

    let err = services
        .evaluations
        .create(EvaluationDraft {
            analysis_id: Some(task_id),
            ..draft(2, 3, 7.0, true)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaperGraphError::Forbidden(_)));

    let created = services
        .evaluations
        .create(EvaluationDraft {
            analysis_id: Some(task_id),
            ..draft(1, 3, 7.0, true)
        })
        .await
        .unwrap();
    let found = services.evaluations.get_by_analysis(task_id, 2).await.unwrap();
    assert_eq!(found.evaluation.id, created.evaluation.id);

    assert!(services
        .evaluations
        .get_by_analysis(task_id + 1_000, 1)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn failed_activity_write_leaves_no_evaluation() {
    let (store, services) = setup().await;
    store.fail_activity_writes(true);
    assert!(services.evaluations.create(draft(1, 5, 5.0, true)).await.is_err());
    store.fail_activity_writes(false);

    let mine = services
        .evaluations
        .list_by_user(1, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 0);
}
