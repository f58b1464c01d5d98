use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use papergraph_common::{
    ActivityFilter, ActivityStats, Author, FeedActivity, NewActivity, Page, Result, UserActivity,
    UserId,
};
use sqlx::{Postgres, QueryBuilder};

use super::{insert_activity, PgStore};
use crate::traits::ActivityRepository;

/// Activity columns prefixed with `a.` plus the joined author, for feeds.
const FEED_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.event_type, a.target_type, a.target_id, a.title, a.content,
           a.metadata, a.visibility, a.like_count, a.comment_count, a.created_at,
           a.updated_at, a.deleted_at,
           u.id AS author_id, u.name AS author_name, u.avatar AS author_avatar
    FROM user_activities a
    LEFT JOIN users u ON u.id = a.user_id AND u.deleted_at IS NULL
"#;

#[derive(sqlx::FromRow)]
struct FeedActivityRow {
    #[sqlx(flatten)]
    activity: UserActivity,
    author_id: Option<i64>,
    author_name: Option<String>,
    author_avatar: Option<String>,
}

impl From<FeedActivityRow> for FeedActivity {
    fn from(row: FeedActivityRow) -> Self {
        let author = row.author_id.map(|id| Author {
            id,
            name: row.author_name.unwrap_or_default(),
            avatar: row.author_avatar,
        });
        FeedActivity {
            activity: row.activity,
            author,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    qb.push(" WHERE a.deleted_at IS NULL");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND a.user_id = ").push_bind(user_id);
    }
    if let Some(event_type) = filter.event_type {
        qb.push(" AND a.event_type = ").push_bind(event_type.as_str());
    }
    if let Some(target_type) = filter.target_type {
        qb.push(" AND a.target_type = ").push_bind(target_type.as_str());
    }
    if let Some(target_id) = filter.target_id {
        qb.push(" AND a.target_id = ").push_bind(target_id);
    }
    if let Some(visibility) = filter.visibility {
        qb.push(" AND a.visibility = ").push_bind(visibility.as_str());
    }
}

#[async_trait]
impl ActivityRepository for PgStore {
    async fn append_activity(&self, activity: NewActivity) -> Result<UserActivity> {
        insert_activity(&self.pool, &activity).await
    }

    async fn find_activity(&self, id: i64) -> Result<Option<FeedActivity>> {
        let sql = format!("{FEED_SELECT} WHERE a.id = $1 AND a.deleted_at IS NULL");
        let row = sqlx::query_as::<_, FeedActivityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<(Vec<FeedActivity>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM user_activities a");
        push_filter(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let rows = qb
            .build_query_as::<FeedActivityRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn tombstone_activity(&self, id: i64, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_activities
            SET deleted_at = now(), updated_at = now()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activity_stats(&self, user_id: UserId, since: DateTime<Utc>) -> Result<ActivityStats> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT event_type,
                   COUNT(*),
                   COUNT(*) FILTER (WHERE created_at >= $2)
            FROM user_activities
            WHERE user_id = $1 AND deleted_at IS NULL
            GROUP BY event_type
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ActivityStats {
            by_event_type: BTreeMap::new(),
            ..Default::default()
        };
        for (event_type, count, recent) in rows {
            stats.total += count;
            stats.recent_7_days += recent;
            stats.by_event_type.insert(event_type, count);
        }
        Ok(stats)
    }

    async fn activity_feed(
        &self,
        viewer: UserId,
        audience: &[UserId],
        page: Page,
    ) -> Result<Vec<FeedActivity>> {
        let sql = format!(
            r#"
            {FEED_SELECT}
            WHERE a.deleted_at IS NULL
              AND a.user_id = ANY($2)
              AND (
                    a.user_id = $1
                 OR a.visibility = 'public'
                 OR (a.visibility = 'friends' AND EXISTS (
                        SELECT 1 FROM user_follows f
                        WHERE f.follower_id = a.user_id
                          AND f.following_id = $1
                          AND f.deleted_at IS NULL
                    ))
              )
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $3 OFFSET $4
            "#
        );
        let rows = sqlx::query_as::<_, FeedActivityRow>(&sql)
            .bind(viewer)
            .bind(audience)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
