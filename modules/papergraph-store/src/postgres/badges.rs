use async_trait::async_trait;
use papergraph_common::{
    BadgeTemplate, NewActivity, NewBadgeTemplate, Result, UserBadge, UserId,
};

use super::{insert_activity, PgStore};
use crate::traits::BadgeRepository;

const TEMPLATE_COLUMNS: &str =
    "id, badge_type, name, description, icon, condition, level, category, created_at";
const BADGE_COLUMNS: &str =
    "id, user_id, badge_type, name, description, icon, level, created_at, deleted_at";

#[async_trait]
impl BadgeRepository for PgStore {
    async fn seed_badge_templates(&self, templates: &[NewBadgeTemplate]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for template in templates {
            let result = sqlx::query(
                r#"
                INSERT INTO badge_templates
                    (badge_type, name, description, icon, condition, level, category)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (badge_type) DO NOTHING
                "#,
            )
            .bind(&template.badge_type)
            .bind(&template.name)
            .bind(&template.description)
            .bind(&template.icon)
            .bind(&template.condition)
            .bind(template.level)
            .bind(template.category.as_str())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_badge_templates(&self) -> Result<Vec<BadgeTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM badge_templates WHERE deleted_at IS NULL ORDER BY id ASC"
        );
        sqlx::query_as::<_, BadgeTemplate>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_badge_template(&self, badge_type: &str) -> Result<Option<BadgeTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM badge_templates \
             WHERE badge_type = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, BadgeTemplate>(&sql)
            .bind(badge_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_user_badge(
        &self,
        user_id: UserId,
        badge_type: &str,
    ) -> Result<Option<UserBadge>> {
        let sql = format!(
            "SELECT {BADGE_COLUMNS} FROM user_badges \
             WHERE user_id = $1 AND badge_type = $2 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, UserBadge>(&sql)
            .bind(user_id)
            .bind(badge_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn award_badge(
        &self,
        user_id: UserId,
        template: &BadgeTemplate,
        activity: NewActivity,
    ) -> Result<Option<UserBadge>> {
        let mut tx = self.pool.begin().await?;

        // The (user_id, badge_type) unique key makes the award idempotent even
        // when two evaluations race.
        let sql = format!(
            r#"
            INSERT INTO user_badges (user_id, badge_type, name, description, icon, level)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, badge_type) DO NOTHING
            RETURNING {BADGE_COLUMNS}
            "#
        );
        let badge = sqlx::query_as::<_, UserBadge>(&sql)
            .bind(user_id)
            .bind(&template.badge_type)
            .bind(&template.name)
            .bind(&template.description)
            .bind(&template.icon)
            .bind(template.level)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(badge) = badge else {
            return Ok(None);
        };

        let activity = NewActivity {
            target_id: badge.id,
            ..activity
        };
        insert_activity(&mut *tx, &activity).await?;

        tx.commit().await?;
        Ok(Some(badge))
    }

    async fn list_user_badges(&self, user_id: UserId) -> Result<Vec<UserBadge>> {
        let sql = format!(
            "SELECT {BADGE_COLUMNS} FROM user_badges \
             WHERE user_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, UserBadge>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }
}
