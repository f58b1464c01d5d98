use std::collections::BTreeMap;

use async_trait::async_trait;
use papergraph_common::{
    DimensionDetail, EvaluationDetail, EvaluationDimension, EvaluationId, EvaluationLikeToggle,
    EvaluationMetric, EvaluationStatistics, EvaluationUpdate, NewActivity, NewEvaluation, Page,
    PaperEvaluation, PaperGraphError, Result, ScoreBand, TaskId, UserId,
};
use sqlx::PgExecutor;

use super::{insert_activity, PgStore};
use crate::traits::EvaluationRepository;

const EVALUATION_COLUMNS: &str = "e.id, e.analysis_id, e.user_id, e.paper_id, e.overall_score, \
     e.summary, e.recommendation, e.originality_score, e.depth_score, e.logic_score, \
     e.evidence_score, e.language_score, e.value_score, e.content_score, e.structure_score, \
     e.method_score, e.is_public, e.is_verified, e.like_count, e.comment_count, e.created_at, \
     e.updated_at, e.deleted_at";

const DIMENSION_COLUMNS: &str =
    "id, evaluation_id, dimension_key, dimension_name, score, description, evidence, created_at";

const METRIC_COLUMNS: &str =
    "id, dimension_id, metric_key, metric_name, score, description, evidence, created_at";

/// `$1` is the LIKE pattern.
const SEARCH_WHERE: &str = r#"
    WHERE e.deleted_at IS NULL AND e.is_public AND (
        e.summary ILIKE $1
        OR e.recommendation ILIKE $1
        OR EXISTS (
            SELECT 1 FROM evaluation_dimensions d
            WHERE d.evaluation_id = e.id AND (d.description ILIKE $1 OR d.evidence ILIKE $1)
        )
    )
"#;

/// Escape LIKE wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

async fn load_dimensions<'e, E>(
    executor: E,
    evaluation_id: EvaluationId,
) -> Result<Vec<EvaluationDimension>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {DIMENSION_COLUMNS} FROM evaluation_dimensions \
         WHERE evaluation_id = $1 ORDER BY id ASC"
    );
    sqlx::query_as::<_, EvaluationDimension>(&sql)
        .bind(evaluation_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
}

impl PgStore {
    async fn evaluation_detail(&self, evaluation: PaperEvaluation) -> Result<EvaluationDetail> {
        let dimensions = load_dimensions(&self.pool, evaluation.id).await?;
        let ids: Vec<i64> = dimensions.iter().map(|d| d.id).collect();

        let sql = format!(
            "SELECT {METRIC_COLUMNS} FROM evaluation_metrics \
             WHERE dimension_id = ANY($1) ORDER BY id ASC"
        );
        let metrics = sqlx::query_as::<_, EvaluationMetric>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_dimension: BTreeMap<i64, Vec<EvaluationMetric>> = BTreeMap::new();
        for metric in metrics {
            by_dimension.entry(metric.dimension_id).or_default().push(metric);
        }

        let dimensions = dimensions
            .into_iter()
            .map(|dimension| DimensionDetail {
                metrics: by_dimension.remove(&dimension.id).unwrap_or_default(),
                dimension,
            })
            .collect();

        Ok(EvaluationDetail {
            evaluation,
            dimensions,
        })
    }

    async fn like_count(&self, evaluation_id: EvaluationId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT like_count FROM paper_evaluations WHERE id = $1")
            .bind(evaluation_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("evaluation", evaluation_id))
    }
}

#[async_trait]
impl EvaluationRepository for PgStore {
    async fn insert_evaluation(
        &self,
        evaluation: NewEvaluation,
        activity: NewActivity,
    ) -> Result<EvaluationDetail> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO paper_evaluations AS e
                (analysis_id, user_id, paper_id, overall_score, summary, recommendation,
                 originality_score, depth_score, logic_score, evidence_score, language_score,
                 value_score, content_score, structure_score, method_score, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {EVALUATION_COLUMNS}
            "#
        );
        let scores = evaluation.scores;
        let created = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(evaluation.analysis_id)
            .bind(evaluation.user_id)
            .bind(evaluation.paper_id)
            .bind(evaluation.overall_score)
            .bind(&evaluation.summary)
            .bind(&evaluation.recommendation)
            .bind(scores.originality_score)
            .bind(scores.depth_score)
            .bind(scores.logic_score)
            .bind(scores.evidence_score)
            .bind(scores.language_score)
            .bind(scores.value_score)
            .bind(scores.content_score)
            .bind(scores.structure_score)
            .bind(scores.method_score)
            .bind(evaluation.is_public)
            .fetch_one(&mut *tx)
            .await?;

        let dimension_sql = format!(
            r#"
            INSERT INTO evaluation_dimensions
                (evaluation_id, dimension_key, dimension_name, score, description, evidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DIMENSION_COLUMNS}
            "#
        );
        let metric_sql = format!(
            r#"
            INSERT INTO evaluation_metrics
                (dimension_id, metric_key, metric_name, score, description, evidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {METRIC_COLUMNS}
            "#
        );

        let mut dimensions = Vec::with_capacity(evaluation.dimensions.len());
        for new_dimension in evaluation.dimensions {
            let dimension = sqlx::query_as::<_, EvaluationDimension>(&dimension_sql)
                .bind(created.id)
                .bind(&new_dimension.dimension_key)
                .bind(&new_dimension.dimension_name)
                .bind(new_dimension.score)
                .bind(&new_dimension.description)
                .bind(&new_dimension.evidence)
                .fetch_one(&mut *tx)
                .await?;

            let mut metrics = Vec::with_capacity(new_dimension.metrics.len());
            for new_metric in new_dimension.metrics {
                let metric = sqlx::query_as::<_, EvaluationMetric>(&metric_sql)
                    .bind(dimension.id)
                    .bind(&new_metric.metric_key)
                    .bind(&new_metric.metric_name)
                    .bind(new_metric.score)
                    .bind(&new_metric.description)
                    .bind(&new_metric.evidence)
                    .fetch_one(&mut *tx)
                    .await?;
                metrics.push(metric);
            }
            dimensions.push(DimensionDetail { dimension, metrics });
        }

        let activity = NewActivity {
            target_id: created.id,
            ..activity
        };
        insert_activity(&mut *tx, &activity).await?;

        tx.commit().await?;
        Ok(EvaluationDetail {
            evaluation: created,
            dimensions,
        })
    }

    async fn find_evaluation(&self, id: EvaluationId) -> Result<Option<EvaluationDetail>> {
        let sql = format!(
            "SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e \
             WHERE e.id = $1 AND e.deleted_at IS NULL"
        );
        let evaluation = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match evaluation {
            Some(evaluation) => self.evaluation_detail(evaluation).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_evaluation_by_analysis(
        &self,
        analysis_id: TaskId,
    ) -> Result<Option<EvaluationDetail>> {
        let sql = format!(
            r#"
            SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e
            WHERE e.analysis_id = $1 AND e.deleted_at IS NULL
            ORDER BY e.created_at DESC, e.id DESC
            LIMIT 1
            "#
        );
        let evaluation = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(analysis_id)
            .fetch_optional(&self.pool)
            .await?;

        match evaluation {
            Some(evaluation) => self.evaluation_detail(evaluation).await.map(Some),
            None => Ok(None),
        }
    }

    async fn update_evaluation(
        &self,
        id: EvaluationId,
        update: EvaluationUpdate,
        activity: NewActivity,
    ) -> Result<PaperEvaluation> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE paper_evaluations e
            SET overall_score = $2, summary = $3, recommendation = $4,
                originality_score = $5, depth_score = $6, logic_score = $7,
                evidence_score = $8, language_score = $9, value_score = $10,
                content_score = $11, structure_score = $12, method_score = $13,
                is_public = $14, updated_at = now()
            WHERE e.id = $1 AND e.deleted_at IS NULL
            RETURNING {EVALUATION_COLUMNS}
            "#
        );
        let scores = update.scores;
        let updated = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(id)
            .bind(update.overall_score)
            .bind(&update.summary)
            .bind(&update.recommendation)
            .bind(scores.originality_score)
            .bind(scores.depth_score)
            .bind(scores.logic_score)
            .bind(scores.evidence_score)
            .bind(scores.language_score)
            .bind(scores.value_score)
            .bind(scores.content_score)
            .bind(scores.structure_score)
            .bind(scores.method_score)
            .bind(update.is_public)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("evaluation", id))?;

        insert_activity(&mut *tx, &activity).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn tombstone_evaluation(&self, id: EvaluationId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE paper_evaluations SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_evaluation_like(
        &self,
        evaluation_id: EvaluationId,
        user_id: UserId,
        on_like: NewActivity,
    ) -> Result<EvaluationLikeToggle> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE evaluation_likes SET deleted_at = now()
            WHERE evaluation_id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(evaluation_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let liked = match removed {
            Some(_) => false,
            None => {
                let inserted = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO evaluation_likes (evaluation_id, user_id)
                    VALUES ($1, $2)
                    ON CONFLICT (evaluation_id, user_id) WHERE deleted_at IS NULL DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(evaluation_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

                if inserted.is_none() {
                    // A concurrent identical like committed first.
                    drop(tx);
                    return Ok(EvaluationLikeToggle {
                        evaluation_id,
                        liked: true,
                        like_count: self.like_count(evaluation_id).await?,
                    });
                }
                true
            }
        };

        let delta: i64 = if liked { 1 } else { -1 };
        let like_count = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE paper_evaluations SET like_count = GREATEST(like_count + $2, 0)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING like_count
            "#,
        )
        .bind(evaluation_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PaperGraphError::not_found("evaluation", evaluation_id))?;

        if liked {
            insert_activity(&mut *tx, &on_like).await?;
        }

        tx.commit().await?;
        Ok(EvaluationLikeToggle {
            evaluation_id,
            liked,
            like_count,
        })
    }

    async fn list_paper_evaluations(
        &self,
        paper_id: i64,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let sql = format!(
            r#"
            SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e
            WHERE e.paper_id = $1 AND e.is_public AND e.deleted_at IS NULL
            ORDER BY e.overall_score DESC, e.created_at DESC, e.id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(paper_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM paper_evaluations \
             WHERE paper_id = $1 AND is_public AND deleted_at IS NULL",
        )
        .bind(paper_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn list_user_evaluations(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let sql = format!(
            r#"
            SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e
            WHERE e.user_id = $1 AND e.deleted_at IS NULL
            ORDER BY e.created_at DESC, e.id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM paper_evaluations WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn top_evaluations(&self, limit: i64) -> Result<Vec<PaperEvaluation>> {
        let sql = format!(
            r#"
            SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e
            WHERE e.is_public AND e.deleted_at IS NULL
            ORDER BY e.overall_score DESC, e.like_count DESC, e.id DESC
            LIMIT $1
            "#
        );
        sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn search_evaluations(
        &self,
        query: &str,
        page: Page,
    ) -> Result<(Vec<PaperEvaluation>, i64)> {
        let pattern = like_pattern(query);

        let sql = format!(
            r#"
            SELECT {EVALUATION_COLUMNS} FROM paper_evaluations e
            {SEARCH_WHERE}
            ORDER BY e.overall_score DESC, e.created_at DESC, e.id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, PaperEvaluation>(&sql)
            .bind(&pattern)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!("SELECT COUNT(*) FROM paper_evaluations e {SEARCH_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    async fn evaluation_statistics(&self, paper_id: i64) -> Result<EvaluationStatistics> {
        let (total, avg) = sqlx::query_as::<_, (i64, f64)>(
            r#"
            SELECT COUNT(*), COALESCE(AVG(overall_score), 0)::DOUBLE PRECISION
            FROM paper_evaluations
            WHERE paper_id = $1 AND is_public AND deleted_at IS NULL
            "#,
        )
        .bind(paper_id)
        .fetch_one(&self.pool)
        .await?;

        let bands = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT CASE
                       WHEN overall_score >= 8 THEN 'excellent'
                       WHEN overall_score >= 6 THEN 'good'
                       WHEN overall_score >= 4 THEN 'average'
                       ELSE 'poor'
                   END AS band,
                   COUNT(*)
            FROM paper_evaluations
            WHERE paper_id = $1 AND is_public AND deleted_at IS NULL
            GROUP BY band
            "#,
        )
        .bind(paper_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = EvaluationStatistics::empty(paper_id);
        stats.total_evaluations = total;
        stats.avg_overall_score = avg;
        for (band, count) in bands {
            stats.score_distribution.insert(band.parse::<ScoreBand>()?, count);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("data"), "%data%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
