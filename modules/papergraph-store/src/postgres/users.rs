use async_trait::async_trait;
use papergraph_common::{Author, Result, UserId};

use super::PgStore;
use crate::traits::UserRepository;

#[async_trait]
impl UserRepository for PgStore {
    async fn upsert_user(&self, author: Author) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, avatar)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    avatar = EXCLUDED.avatar,
                    updated_at = now()
            "#,
        )
        .bind(author.id)
        .bind(&author.name)
        .bind(&author.avatar)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_author(&self, user_id: UserId) -> Result<Option<Author>> {
        sqlx::query_as::<_, Author>(
            "SELECT id, name, avatar FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }
}
