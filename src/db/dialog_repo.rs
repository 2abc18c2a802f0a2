// src/db/dialog_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::dialog::Dialog};

#[derive(Clone)]
pub struct DialogRepository {
    pool: PgPool,
}

impl DialogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A regra de escopo que o contexto de autorização alimenta:
    /// visível se o dono é NULL (legado), o próprio usuário, ou uma das
    /// organizações em que ele é membro ativo.
    pub async fn list_visible(
        &self,
        user_id: Uuid,
        organization_ids: &[Uuid],
    ) -> Result<Vec<Dialog>, AppError> {
        sqlx::query_as::<_, Dialog>(
            r#"
            SELECT * FROM dialogs
            WHERE owner_id IS NULL
               OR (owner_type = 'user' AND owner_id = $1)
               OR (owner_type = 'organization' AND owner_id = ANY($2))
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(organization_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn count_for_organization(&self, organization_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM dialogs
            WHERE owner_type = 'organization' AND owner_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
