use std::sync::Arc;

use papergraph_common::{
    BadgeTemplate, EventType, NewActivity, PaperGraphError, Result, TargetType, UserBadge, UserId,
    UserStats,
};
use papergraph_store::Store;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::catalog::{default_catalog, BadgeKind};

/// Outcome of a catalog-wide reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub users_scanned: usize,
    pub awarded: Vec<UserBadge>,
    pub failed_users: Vec<UserId>,
}

/// Evaluates stats against the catalog and awards badges, once per
/// (user, badge type).
#[derive(Clone)]
pub struct BadgeEngine {
    store: Arc<dyn Store>,
}

impl BadgeEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert any catalog templates not yet present.
    pub async fn seed_catalog(&self) -> Result<usize> {
        let inserted = self.store.seed_badge_templates(&default_catalog()).await?;
        if inserted > 0 {
            info!(inserted, "badge catalog seeded");
        } else {
            debug!("badge catalog already seeded");
        }
        Ok(inserted)
    }

    pub async fn get_user_badges(&self, user_id: UserId) -> Result<Vec<UserBadge>> {
        self.store.list_user_badges(user_id).await
    }

    pub async fn get_user_stats(&self, user_id: UserId) -> Result<UserStats> {
        self.store.get_or_create_stats(user_id).await
    }

    /// Award every stat-driven badge the user now qualifies for and does not
    /// already hold. Returns the badges awarded by this call.
    ///
    /// Each award is atomic with its `badge_earned` activity. An error stops
    /// the pass; badges awarded before it stay, and re-running skips them.
    pub async fn evaluate_and_award(&self, user_id: UserId) -> Result<Vec<UserBadge>> {
        let stats = self.store.get_or_create_stats(user_id).await?;
        let templates = self.store.list_badge_templates().await?;

        let mut awarded = Vec::new();
        for template in &templates {
            let Ok(kind) = template.badge_type.parse::<BadgeKind>() else {
                debug!(badge_type = %template.badge_type, "template has no rule, skipping");
                continue;
            };
            let Some(rule) = kind.rule() else {
                continue;
            };
            if stats.get(rule.field) < rule.threshold {
                continue;
            }
            if self
                .store
                .find_user_badge(user_id, &template.badge_type)
                .await?
                .is_some()
            {
                continue;
            }
            if let Some(badge) = self.award(user_id, template).await? {
                awarded.push(badge);
            }
        }

        Ok(awarded)
    }

    /// Same as `evaluate_and_award`, for callers whose own action must not
    /// fail because of badges. Failures are logged and can be reconciled later.
    pub async fn evaluate_logged(&self, user_id: UserId) -> Vec<UserBadge> {
        match self.evaluate_and_award(user_id).await {
            Ok(awarded) => awarded,
            Err(e) => {
                warn!(user_id, error = %e, "badge evaluation failed");
                Vec::new()
            }
        }
    }

    /// Award the badge for a subscription product. Unknown products award
    /// nothing and are not an error; a badge already held is a no-op.
    pub async fn award_subscription_badge(
        &self,
        user_id: UserId,
        product: &str,
    ) -> Result<Option<UserBadge>> {
        let Some(kind) = BadgeKind::for_product(product) else {
            debug!(user_id, product, "product carries no badge");
            return Ok(None);
        };

        let template = self
            .store
            .find_badge_template(kind.as_str())
            .await?
            .ok_or_else(|| PaperGraphError::not_found("badge template", kind))?;

        if self
            .store
            .find_user_badge(user_id, kind.as_str())
            .await?
            .is_some()
        {
            debug!(user_id, badge_type = %kind, "subscription badge already held");
            return Ok(None);
        }

        self.award(user_id, &template).await
    }

    /// Re-run evaluation for every user with a stats row.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let users = self.store.stats_user_ids().await?;
        let mut report = ReconcileReport {
            users_scanned: users.len(),
            ..Default::default()
        };

        for user_id in users {
            match self.evaluate_and_award(user_id).await {
                Ok(mut awarded) => report.awarded.append(&mut awarded),
                Err(e) => {
                    warn!(user_id, error = %e, "reconcile failed for user");
                    report.failed_users.push(user_id);
                }
            }
        }

        info!(
            users = report.users_scanned,
            awarded = report.awarded.len(),
            failed = report.failed_users.len(),
            "badge reconciliation complete"
        );
        Ok(report)
    }

    async fn award(&self, user_id: UserId, template: &BadgeTemplate) -> Result<Option<UserBadge>> {
        // target_id is filled in by the store with the new badge id.
        let activity = NewActivity::new(user_id, EventType::BadgeEarned, TargetType::Badge, 0)
            .with_title(format!("Earned the {} badge", template.name))
            .with_content(template.description.clone())
            .with_metadata(json!({
                "badge_type": template.badge_type,
                "level": template.level,
                "category": template.category,
            }));

        let badge = self.store.award_badge(user_id, template, activity).await?;
        match &badge {
            Some(b) => info!(user_id, badge_type = %b.badge_type, level = b.level, "badge awarded"),
            None => debug!(user_id, badge_type = %template.badge_type, "badge already held"),
        }
        Ok(badge)
    }
}
