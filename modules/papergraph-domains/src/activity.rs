use std::sync::Arc;

use chrono::{Duration, Utc};
use papergraph_common::{
    ActivityFilter, ActivityId, ActivityStats, EventType, FeedActivity, NewActivity,
    PageRequest, Paginated, PaperGraphError, Result, TargetType, UserActivity, UserId, Visibility,
};
use papergraph_store::Store;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Raw activity input as it arrives from a handler. Enum fields are text and
/// are validated before anything is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateActivity {
    pub user_id: UserId,
    pub event_type: String,
    pub target_type: String,
    pub target_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl TryFrom<CreateActivity> for NewActivity {
    type Error = PaperGraphError;

    fn try_from(input: CreateActivity) -> Result<Self> {
        let event_type: EventType = input.event_type.parse()?;
        let target_type: TargetType = input.target_type.parse()?;
        let visibility = match input.visibility.as_deref() {
            None | Some("") => Visibility::default(),
            Some(v) => v.parse()?,
        };
        if input.target_id <= 0 {
            return Err(PaperGraphError::validation("target_id is required"));
        }

        Ok(NewActivity::new(input.user_id, event_type, target_type, input.target_id)
            .with_title(input.title)
            .with_content(input.content)
            .with_metadata(input.metadata.unwrap_or(serde_json::Value::Null))
            .with_visibility(visibility))
    }
}

/// Text filters for the activity listing. Empty means "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<UserId>,
    pub event_type: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub visibility: Option<String>,
}

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = PaperGraphError>,
{
    match value {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

impl TryFrom<&ActivityQuery> for ActivityFilter {
    type Error = PaperGraphError;

    fn try_from(query: &ActivityQuery) -> Result<Self> {
        Ok(ActivityFilter {
            user_id: query.user_id,
            event_type: parse_opt(query.event_type.as_deref())?,
            target_type: parse_opt(query.target_type.as_deref())?,
            target_id: query.target_id,
            visibility: parse_opt(query.visibility.as_deref())?,
        })
    }
}

/// The append-only user timeline.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn Store>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: CreateActivity) -> Result<UserActivity> {
        let activity = NewActivity::try_from(input)?;
        let created = self.store.append_activity(activity).await?;
        info!(
            activity_id = created.id,
            user_id = created.user_id,
            event_type = %created.event_type,
            "activity created"
        );
        Ok(created)
    }

    pub async fn list(
        &self,
        query: &ActivityQuery,
        request: PageRequest,
    ) -> Result<Paginated<FeedActivity>> {
        let filter = ActivityFilter::try_from(query)?;
        let request = request.normalized();
        let (items, total) = self
            .store
            .list_activities(&filter, request.as_page())
            .await?;
        Ok(Paginated::new(items, request, total))
    }

    pub async fn get(&self, id: ActivityId) -> Result<FeedActivity> {
        self.store
            .find_activity(id)
            .await?
            .ok_or_else(|| PaperGraphError::not_found("activity", id))
    }

    /// Soft-delete. Someone else's activity reads as not found.
    pub async fn delete(&self, id: ActivityId, user_id: UserId) -> Result<()> {
        if !self.store.tombstone_activity(id, user_id).await? {
            return Err(PaperGraphError::not_found("activity", id));
        }
        info!(activity_id = id, user_id, "activity deleted");
        Ok(())
    }

    /// Totals, per-event-type counts and the last seven days.
    pub async fn stats(&self, user_id: UserId) -> Result<ActivityStats> {
        let since = Utc::now() - Duration::days(7);
        self.store.activity_stats(user_id, since).await
    }
}
