//! Every repository trait backed by Postgres.
//!
//! Multi-row operations run inside one `pool.begin()` transaction and are
//! rolled back on drop if any statement fails. Counter columns are only ever
//! written with additive, floored expressions.

mod activities;
mod badges;
mod comments;
mod evaluations;
mod follows;
mod reactions;
mod stats;
mod tasks;
mod users;

use papergraph_common::{NewActivity, Result, StatField, UserActivity, UserId, UserStats};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgExecutor, PgPool};

pub(crate) const STATS_COLUMNS: &str = "user_id, analysis_count, public_analysis_count, like_count, \
     comment_count, follower_count, following_count, share_count, total_score, \
     created_at, updated_at, deleted_at";

pub(crate) const ACTIVITY_COLUMNS: &str = "id, user_id, event_type, target_type, target_id, title, \
     content, metadata, visibility, like_count, comment_count, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// `field = GREATEST(field + delta, 0)`, creating the row when missing.
pub(crate) async fn apply_delta<'e, E>(
    executor: E,
    user_id: UserId,
    field: StatField,
    delta: i64,
) -> Result<UserStats>
where
    E: PgExecutor<'e>,
{
    let column = field.column();
    let sql = format!(
        r#"
        INSERT INTO user_stats (user_id, {column})
        VALUES ($1, GREATEST($2, 0))
        ON CONFLICT (user_id) DO UPDATE
            SET {column} = GREATEST(user_stats.{column} + $2, 0),
                updated_at = now()
        RETURNING {STATS_COLUMNS}
        "#
    );

    sqlx::query_as::<_, UserStats>(&sql)
        .bind(user_id)
        .bind(delta)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
}

pub(crate) async fn insert_activity<'e, E>(executor: E, activity: &NewActivity) -> Result<UserActivity>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        INSERT INTO user_activities
            (user_id, event_type, target_type, target_id, title, content, metadata, visibility)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ACTIVITY_COLUMNS}
        "#
    );

    sqlx::query_as::<_, UserActivity>(&sql)
        .bind(activity.user_id)
        .bind(activity.event_type.as_str())
        .bind(activity.target_type.as_str())
        .bind(activity.target_id)
        .bind(&activity.title)
        .bind(&activity.content)
        .bind(&activity.metadata)
        .bind(activity.visibility.as_str())
        .fetch_one(executor)
        .await
        .map_err(Into::into)
}
