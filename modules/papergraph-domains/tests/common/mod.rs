#![allow(dead_code)]

use std::sync::Arc;

use papergraph_common::{TaskId, UserId};
use papergraph_domains::analysis::{BasicInfo, ContentQuality, Summary};
use papergraph_domains::{AnalysisDocument, Services};
use papergraph_store::MemoryStore;

/// Services over a fresh in-memory store with the badge catalog seeded.
pub async fn setup() -> (Arc<MemoryStore>, Services) {
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone());
    services.badges.seed_catalog().await.unwrap();
    (store, services)
}

pub fn document(title: &str, rating: i32) -> AnalysisDocument {
    AnalysisDocument {
        basic_info: BasicInfo {
            title: title.to_string(),
            ..Default::default()
        },
        summary: Summary {
            conclusion: format!("{title} holds up"),
            ..Default::default()
        },
        content_quality: ContentQuality::uniform(rating),
    }
}

/// A completed analysis, public or not.
pub async fn completed_task(services: &Services, user_id: UserId, rating: i32, public: bool) -> TaskId {
    let task = services.tasks.create(user_id, 100 + user_id).await.unwrap();
    if public {
        services.tasks.set_public(user_id, task.id, true).await.unwrap();
    }
    services
        .tasks
        .complete(task.id, &document("paper", rating))
        .await
        .unwrap();
    task.id
}

/// Have `count` distinct fresh users like the task.
pub async fn like_times(services: &Services, task_id: TaskId, count: i64, first_user: UserId) {
    for user in first_user..first_user + count {
        services.reactions.react(user, task_id, "like").await.unwrap();
    }
}
