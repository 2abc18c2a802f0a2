// src/db/department_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::tenancy::{Department, DepartmentSummary, Membership};

#[derive(Clone)]
pub struct DepartmentRepository {
    pool: PgPool,
}

impl DepartmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        organization_id: Uuid,
        name: &str,
        head_user_id: Option<Uuid>,
    ) -> Result<Department, AppError> {
        sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (organization_id, name, head_user_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .bind(head_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Department>, AppError> {
        sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Listagem com nome do responsável e contagem de membros, em uma consulta só
    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<DepartmentSummary>, AppError> {
        sqlx::query_as::<_, DepartmentSummary>(
            r#"
            SELECT d.id,
                   d.organization_id,
                   d.name,
                   d.head_user_id,
                   u.full_name AS head_user_name,
                   (SELECT COUNT(*) FROM memberships m
                    WHERE m.department_id = d.id AND m.is_active = TRUE) AS member_count,
                   d.is_active,
                   d.created_at
            FROM departments d
            LEFT JOIN users u ON u.id = d.head_user_id
            WHERE d.organization_id = $1 AND d.is_active = TRUE
            ORDER BY d.name
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        head_user_id: Option<Uuid>,
    ) -> Result<Option<Department>, AppError> {
        sqlx::query_as::<_, Department>(
            r#"
            UPDATE departments
            SET name = COALESCE($2, name),
                head_user_id = COALESCE($3, head_user_id),
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(head_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn deactivate<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result =
            sqlx::query("UPDATE departments SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active = TRUE")
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // Apagar um departamento desvincula os membros, não os remove.
    pub async fn unlink_members<'e, E>(&self, executor: E, department_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE memberships SET department_id = NULL, updated_at = NOW() WHERE department_id = $1",
        )
        .bind(department_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_member_department(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        department_id: Option<Uuid>,
    ) -> Result<Option<Membership>, AppError> {
        sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET department_id = $3, updated_at = NOW()
            WHERE organization_id = $1 AND user_id = $2 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(department_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }
}
