// src/services/department_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DepartmentRepository, TenancyRepository},
    models::tenancy::{Department, DepartmentSummary, Membership},
};

/// Departamentos: agrupamento opcional de membros dentro de uma organização.
/// Nenhuma decisão de autorização passa por aqui — papel é papel, departamento
/// é organograma.
#[derive(Clone)]
pub struct DepartmentService {
    department_repo: DepartmentRepository,
    tenancy_repo: TenancyRepository,
    pool: PgPool,
}

impl DepartmentService {
    pub fn new(
        department_repo: DepartmentRepository,
        tenancy_repo: TenancyRepository,
        pool: PgPool,
    ) -> Self {
        Self {
            department_repo,
            tenancy_repo,
            pool,
        }
    }

    /// Cria um departamento. O responsável, se informado, precisa ser
    /// membro ativo da organização.
    pub async fn create_department(
        &self,
        organization_id: Uuid,
        name: &str,
        head_user_id: Option<Uuid>,
    ) -> Result<Department, AppError> {
        if let Some(head_id) = head_user_id {
            if !self.tenancy_repo.is_member(head_id, organization_id).await? {
                return Err(AppError::Validation(
                    "O responsável pelo departamento precisa ser membro da organização.".into(),
                ));
            }
        }

        self.department_repo
            .insert(organization_id, name, head_user_id)
            .await
    }

    pub async fn list_departments(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<DepartmentSummary>, AppError> {
        self.department_repo
            .list_for_organization(organization_id)
            .await
    }

    pub async fn update_department(
        &self,
        organization_id: Uuid,
        department_id: Uuid,
        name: Option<&str>,
        head_user_id: Option<Uuid>,
    ) -> Result<Department, AppError> {
        self.find_in_organization(organization_id, department_id)
            .await?;

        if let Some(head_id) = head_user_id {
            if !self.tenancy_repo.is_member(head_id, organization_id).await? {
                return Err(AppError::Validation(
                    "O responsável pelo departamento precisa ser membro da organização.".into(),
                ));
            }
        }

        self.department_repo
            .update(department_id, name, head_user_id)
            .await?
            .ok_or(AppError::DepartmentNotFound)
    }

    /// Apaga (desativa) um departamento e desvincula os membros na MESMA
    /// transação — ninguém fica apontando para um departamento inativo.
    pub async fn delete_department(
        &self,
        organization_id: Uuid,
        department_id: Uuid,
    ) -> Result<(), AppError> {
        self.find_in_organization(organization_id, department_id)
            .await?;

        let mut tx = self.pool.begin().await?;
        let unlinked = self
            .department_repo
            .unlink_members(&mut *tx, department_id)
            .await?;
        let deleted = self
            .department_repo
            .deactivate(&mut *tx, department_id)
            .await?;
        if !deleted {
            return Err(AppError::DepartmentNotFound);
        }
        tx.commit().await?;

        tracing::info!(
            "Departamento {} desativado ({} membros desvinculados)",
            department_id,
            unlinked
        );
        Ok(())
    }

    /// Move um membro para um departamento (ou para nenhum, com None).
    pub async fn assign_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        department_id: Option<Uuid>,
    ) -> Result<Membership, AppError> {
        if let Some(dept_id) = department_id {
            self.find_in_organization(organization_id, dept_id).await?;
        }

        self.department_repo
            .set_member_department(organization_id, user_id, department_id)
            .await?
            .ok_or(AppError::MembershipNotFound)
    }

    // O id vindo da URL precisa pertencer à organização da URL; sem isso um
    // admin de uma organização mexeria nos departamentos de outra.
    async fn find_in_organization(
        &self,
        organization_id: Uuid,
        department_id: Uuid,
    ) -> Result<Department, AppError> {
        self.department_repo
            .find_active_by_id(department_id)
            .await?
            .filter(|d| d.organization_id == organization_id)
            .ok_or(AppError::DepartmentNotFound)
    }
}
