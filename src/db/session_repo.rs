// src/db/session_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::session::Session};

// O ledger de sessões: mapeia jti -> sessão e user_id -> sessões.
// É a ÚNICA fonte de verdade para revogação; assinatura e expiração do
// token não bastam para autorizar nada.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        token_jti: Uuid,
        refresh_token_jti: Uuid,
        organization_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_jti, refresh_token_jti, organization_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_jti)
        .bind(refresh_token_jti)
        .bind(organization_id)
        .bind(expires_at)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    // As duas buscas filtram active=TRUE: uma sessão revogada simplesmente
    // "não existe" para o caminho de autorização.
    pub async fn find_active_by_access_jti(&self, jti: Uuid) -> Result<Option<Session>, AppError> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token_jti = $1 AND is_active = TRUE",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_active_by_refresh_jti(&self, jti: Uuid) -> Result<Option<Session>, AppError> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE refresh_token_jti = $1 AND is_active = TRUE",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Revogação é idempotente: revogar uma sessão já revogada não é erro.
    pub async fn revoke<'e, E>(&self, executor: E, session_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE sessions SET is_active = FALSE WHERE id = $1")
            .bind(session_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // "Sair de todos os dispositivos": revoga tudo do usuário, exceto
    // opcionalmente a sessão corrente.
    pub async fn revoke_all_for_user<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        except_session_id: Option<Uuid>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE
            WHERE user_id = $1
              AND is_active = TRUE
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(user_id)
        .bind(except_session_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    // Manutenção: apaga de vez linhas expiradas, independente do flag de
    // revogação. Nunca roda no caminho da requisição.
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
