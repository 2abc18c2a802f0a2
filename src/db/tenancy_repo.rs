// src/db/tenancy_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::tenancy::{MemberRecord, Membership, Organization, OrganizationWithRole, Role};

#[derive(Clone)]
pub struct TenancyRepository {
    pool: PgPool,
}

impl TenancyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Organizações
    // ---

    pub async fn insert_organization<'e, E>(
        &self,
        executor: E,
        name: &str,
        slug: &str,
        access_code: &str,
    ) -> Result<Organization, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug, access_code)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(access_code)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::AlreadyExists(
                        "Já existe uma organização com este slug.".into(),
                    );
                }
            }
            AppError::DatabaseError(e)
        })
    }

    pub async fn find_organization_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE slug = $1 AND is_active = TRUE",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_organization_by_access_code(
        &self,
        access_code: &str,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE access_code = $1 AND is_active = TRUE",
        )
        .bind(access_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Usado pelo sorteio de códigos: verifica colisão da forma mais barata possível.
    pub async fn access_code_exists(&self, access_code: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM organizations WHERE access_code = $1)",
        )
        .bind(access_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn update_organization_name(
        &self,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = $2, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Soft delete: a organização some das buscas, mas as linhas ficam.
    pub async fn deactivate_organization(&self, id: Uuid) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE organizations SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active = TRUE")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Memberships
    // ---

    pub async fn insert_membership<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (user_id, organization_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::AlreadyExists(
                        "Este usuário já é membro da organização.".into(),
                    );
                }
            }
            AppError::DatabaseError(e)
        })
    }

    // Membership de um par (org, usuário), ativa ou não: quem chama decide
    // o que fazer com o flag.
    pub async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_active_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE organization_id = $1 AND user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // A verificação de pertencimento mais rápida possível.
    pub async fn is_member(&self, user_id: Uuid, organization_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM memberships
                WHERE user_id = $1 AND organization_id = $2 AND is_active = TRUE
            )
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Conta os donos ativos TRAVANDO as linhas (FOR UPDATE). Precisa rodar
    /// dentro da mesma transação da mutação: é o que impede duas demoções
    /// concorrentes de passarem ambas pela checagem do último dono.
    pub async fn count_active_owners_for_update<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM memberships
            WHERE organization_id = $1 AND role = 'owner' AND is_active = TRUE
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .fetch_all(executor)
        .await?;
        Ok(ids.len() as i64)
    }

    pub async fn update_membership_role<'e, E>(
        &self,
        executor: E,
        membership_id: Uuid,
        new_role: Role,
    ) -> Result<Membership, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(membership_id)
        .bind(new_role)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn deactivate_membership<'e, E>(
        &self,
        executor: E,
        membership_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE memberships SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(membership_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // Reativa uma membership desativada (readmissão de ex-membro)
    pub async fn reactivate_membership<'e, E>(
        &self,
        executor: E,
        membership_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET is_active = TRUE, role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(membership_id)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn count_members_by_role(
        &self,
        organization_id: Uuid,
        role: Role,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM memberships
            WHERE organization_id = $1 AND role = $2 AND is_active = TRUE
            "#,
        )
        .bind(organization_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ---
    // Projeções de leitura
    // ---

    pub async fn list_members(
        &self,
        organization_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MemberRecord>, AppError> {
        sqlx::query_as::<_, MemberRecord>(
            r#"
            SELECT u.id AS user_id,
                   u.username,
                   u.email,
                   u.full_name,
                   m.role,
                   m.department_id,
                   m.is_active,
                   m.created_at AS joined_at,
                   u.last_login_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
              AND ($2 = FALSE OR m.is_active = TRUE)
            ORDER BY m.created_at
            "#,
        )
        .bind(organization_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Todas as organizações ativas de um usuário, com o papel dele em cada uma
    pub async fn list_user_organizations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationWithRole>, AppError> {
        sqlx::query_as::<_, OrganizationWithRole>(
            r#"
            SELECT o.id, o.name, o.slug, m.role
            FROM organizations o
            JOIN memberships m ON m.organization_id = o.id
            WHERE m.user_id = $1
              AND m.is_active = TRUE
              AND o.is_active = TRUE
            ORDER BY o.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn list_user_organization_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        sqlx::query_scalar(
            r#"
            SELECT m.organization_id
            FROM memberships m
            JOIN organizations o ON o.id = m.organization_id
            WHERE m.user_id = $1 AND m.is_active = TRUE AND o.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }
}
