use std::collections::HashSet;
use std::sync::Arc;

use papergraph_common::{
    EvaluationDetail, EvaluationId, EvaluationLikeToggle, EvaluationScores, EvaluationStatistics,
    EvaluationUpdate, EventType, NewActivity, NewDimension, NewEvaluation, NewMetric, Page,
    PageRequest, Paginated, PaperEvaluation, PaperGraphError, Result, ScoreBand, TargetType,
    TaskId, UserId, Visibility,
};
use papergraph_store::Store;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::catalog;

pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricDraft {
    pub key: String,
    pub score: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionDraft {
    pub key: String,
    pub score: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub metrics: Vec<MetricDraft>,
}

/// An evaluation as submitted. Dimension and metric keys must come from the
/// catalog; every score is on a 0..=10 scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationDraft {
    pub user_id: UserId,
    pub paper_id: i64,
    #[serde(default)]
    pub analysis_id: Option<TaskId>,
    pub overall_score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub scores: EvaluationScores,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub dimensions: Vec<DimensionDraft>,
}

fn check_score(what: &str, score: f64) -> Result<()> {
    if score.is_finite() && (0.0..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(PaperGraphError::validation(format!(
            "{what} must be between 0 and {MAX_SCORE}, got {score}"
        )))
    }
}

fn check_scores(overall: f64, scores: &EvaluationScores) -> Result<()> {
    check_score("overall_score", overall)?;
    for (name, score) in scores.named() {
        check_score(name, score)?;
    }
    Ok(())
}

fn recommendation_or_advice(recommendation: String, overall: f64) -> String {
    if recommendation.trim().is_empty() {
        ScoreBand::of(overall).advice().to_string()
    } else {
        recommendation
    }
}

fn resolve_dimension(draft: DimensionDraft) -> Result<NewDimension> {
    let spec = catalog::dimension(&draft.key).ok_or_else(|| {
        PaperGraphError::validation(format!("unknown evaluation dimension: {}", draft.key))
    })?;
    check_score(spec.key, draft.score)?;

    let mut seen = HashSet::new();
    let metrics = draft
        .metrics
        .into_iter()
        .map(|metric| {
            let metric_spec = spec.metric(&metric.key).ok_or_else(|| {
                PaperGraphError::validation(format!(
                    "unknown metric {} for dimension {}",
                    metric.key, spec.key
                ))
            })?;
            if !seen.insert(metric_spec.key) {
                return Err(PaperGraphError::validation(format!(
                    "duplicate metric {} for dimension {}",
                    metric_spec.key, spec.key
                )));
            }
            check_score(metric_spec.key, metric.score)?;
            Ok(NewMetric {
                metric_key: metric_spec.key.to_string(),
                metric_name: metric_spec.name.to_string(),
                score: metric.score,
                description: metric.description,
                evidence: metric.evidence,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NewDimension {
        dimension_key: spec.key.to_string(),
        dimension_name: spec.name.to_string(),
        score: draft.score,
        description: draft.description,
        evidence: draft.evidence,
        metrics,
    })
}

impl TryFrom<EvaluationDraft> for NewEvaluation {
    type Error = PaperGraphError;

    fn try_from(draft: EvaluationDraft) -> Result<Self> {
        if draft.paper_id <= 0 {
            return Err(PaperGraphError::validation("paper_id is required"));
        }
        check_scores(draft.overall_score, &draft.scores)?;

        let mut seen = HashSet::new();
        for dimension in &draft.dimensions {
            if !seen.insert(dimension.key.as_str()) {
                return Err(PaperGraphError::validation(format!(
                    "duplicate evaluation dimension: {}",
                    dimension.key
                )));
            }
        }
        let dimensions = draft
            .dimensions
            .into_iter()
            .map(resolve_dimension)
            .collect::<Result<Vec<_>>>()?;

        Ok(NewEvaluation {
            user_id: draft.user_id,
            paper_id: draft.paper_id,
            analysis_id: draft.analysis_id,
            overall_score: draft.overall_score,
            summary: draft.summary,
            recommendation: recommendation_or_advice(draft.recommendation, draft.overall_score),
            scores: draft.scores,
            is_public: draft.is_public,
            dimensions,
        })
    }
}

fn visibility(is_public: bool) -> Visibility {
    if is_public {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

/// Scored, multi-dimension evaluations of papers, with likes and per-paper
/// aggregates. Private evaluations read as missing to everyone but the author.
#[derive(Clone)]
pub struct Evaluations {
    store: Arc<dyn Store>,
}

impl Evaluations {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: EvaluationDraft) -> Result<EvaluationDetail> {
        let evaluation = NewEvaluation::try_from(draft)?;

        if let Some(task_id) = evaluation.analysis_id {
            let task = self
                .store
                .find_task(task_id)
                .await?
                .ok_or_else(|| PaperGraphError::not_found("task", task_id))?;
            if task.user_id != evaluation.user_id {
                return Err(PaperGraphError::Forbidden(format!(
                    "task {task_id} belongs to another user"
                )));
            }
        }

        let activity = NewActivity::new(
            evaluation.user_id,
            EventType::EvaluationCreated,
            TargetType::Evaluation,
            0,
        )
        .with_title(format!("evaluated paper {}", evaluation.paper_id))
        .with_content(evaluation.summary.clone())
        .with_metadata(json!({
            "paper_id": evaluation.paper_id,
            "overall_score": evaluation.overall_score,
            "band": ScoreBand::of(evaluation.overall_score),
        }))
        .with_visibility(visibility(evaluation.is_public));

        let detail = self.store.insert_evaluation(evaluation, activity).await?;
        info!(
            evaluation_id = detail.evaluation.id,
            user_id = detail.evaluation.user_id,
            paper_id = detail.evaluation.paper_id,
            overall_score = detail.evaluation.overall_score,
            "evaluation created"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: EvaluationId, viewer: UserId) -> Result<EvaluationDetail> {
        self.store
            .find_evaluation(id)
            .await?
            .filter(|d| d.evaluation.visible_to(viewer))
            .ok_or_else(|| PaperGraphError::not_found("evaluation", id))
    }

    pub async fn get_by_analysis(
        &self,
        analysis_id: TaskId,
        viewer: UserId,
    ) -> Result<EvaluationDetail> {
        self.store
            .find_evaluation_by_analysis(analysis_id)
            .await?
            .filter(|d| d.evaluation.visible_to(viewer))
            .ok_or_else(|| PaperGraphError::not_found("evaluation for task", analysis_id))
    }

    async fn owned(&self, user_id: UserId, id: EvaluationId) -> Result<PaperEvaluation> {
        let evaluation = self
            .store
            .find_evaluation(id)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("evaluation", id))?
            .evaluation;
        if evaluation.user_id != user_id {
            return Err(PaperGraphError::Forbidden(format!(
                "evaluation {id} belongs to another user"
            )));
        }
        Ok(evaluation)
    }

    /// Owner-only. A blank recommendation is replaced with the advice for
    /// the new score band.
    pub async fn update(
        &self,
        user_id: UserId,
        id: EvaluationId,
        update: EvaluationUpdate,
    ) -> Result<PaperEvaluation> {
        check_scores(update.overall_score, &update.scores)?;
        let before = self.owned(user_id, id).await?;

        let update = EvaluationUpdate {
            recommendation: recommendation_or_advice(update.recommendation, update.overall_score),
            ..update
        };
        let activity = NewActivity::new(user_id, EventType::EvaluationUpdated, TargetType::Evaluation, id)
            .with_title(format!("updated evaluation of paper {}", before.paper_id))
            .with_metadata(json!({
                "paper_id": before.paper_id,
                "previous_score": before.overall_score,
                "overall_score": update.overall_score,
            }))
            .with_visibility(visibility(update.is_public));

        let updated = self.store.update_evaluation(id, update, activity).await?;
        info!(evaluation_id = id, user_id, "evaluation updated");
        Ok(updated)
    }

    /// Owner-only soft delete.
    pub async fn delete(&self, user_id: UserId, id: EvaluationId) -> Result<()> {
        self.owned(user_id, id).await?;
        if !self.store.tombstone_evaluation(id).await? {
            return Err(PaperGraphError::not_found("evaluation", id));
        }
        info!(evaluation_id = id, user_id, "evaluation deleted");
        Ok(())
    }

    /// Toggle: a second call removes the like.
    pub async fn toggle_like(&self, user_id: UserId, id: EvaluationId) -> Result<EvaluationLikeToggle> {
        let evaluation = self.get(id, user_id).await?.evaluation;

        let activity = NewActivity::new(user_id, EventType::EvaluationLiked, TargetType::Evaluation, id)
            .with_title(format!("liked an evaluation of paper {}", evaluation.paper_id))
            .with_metadata(json!({ "author_id": evaluation.user_id }));

        let toggle = self.store.toggle_evaluation_like(id, user_id, activity).await?;
        info!(
            evaluation_id = id,
            user_id,
            liked = toggle.liked,
            like_count = toggle.like_count,
            "evaluation like toggled"
        );
        Ok(toggle)
    }

    /// Public evaluations of a paper, best score first.
    pub async fn list_by_paper(
        &self,
        paper_id: i64,
        request: PageRequest,
    ) -> Result<Paginated<PaperEvaluation>> {
        let request = request.normalized();
        let (items, total) = self
            .store
            .list_paper_evaluations(paper_id, request.as_page())
            .await?;
        Ok(Paginated::new(items, request, total))
    }

    /// The author's own evaluations, private ones included, newest first.
    pub async fn list_by_user(
        &self,
        user_id: UserId,
        request: PageRequest,
    ) -> Result<Paginated<PaperEvaluation>> {
        let request = request.normalized();
        let (items, total) = self
            .store
            .list_user_evaluations(user_id, request.as_page())
            .await?;
        Ok(Paginated::new(items, request, total))
    }

    pub async fn top(&self, limit: i64) -> Result<Vec<PaperEvaluation>> {
        self.store.top_evaluations(Page::new(limit, 0).limit).await
    }

    pub async fn search(
        &self,
        query: &str,
        request: PageRequest,
    ) -> Result<Paginated<PaperEvaluation>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PaperGraphError::validation("search query is required"));
        }
        let request = request.normalized();
        let (items, total) = self
            .store
            .search_evaluations(query, request.as_page())
            .await?;
        Ok(Paginated::new(items, request, total))
    }

    pub async fn statistics(&self, paper_id: i64) -> Result<EvaluationStatistics> {
        self.store.evaluation_statistics(paper_id).await
    }
}
