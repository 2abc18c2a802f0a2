// src/handlers/departments.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::Authenticated,
    models::tenancy::{Department, DepartmentSummary, Membership, Role},
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDepartmentPayload {
    #[validate(length(min = 1, max = 255, message = "O nome do departamento é obrigatório."))]
    pub name: String,
    pub head_user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDepartmentPayload {
    #[validate(length(min = 1, max = 255, message = "O nome do departamento não pode ser vazio."))]
    pub name: Option<String>,
    pub head_user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignMemberPayload {
    pub user_id: Uuid,
}

// ---
// Handlers
// ---

// GET /api/organizations/{id}/departments
#[utoipa::path(
    get,
    path = "/api/organizations/{id}/departments",
    tag = "Departments",
    params(("id" = Uuid, Path, description = "ID da organização")),
    responses(
        (status = 200, description = "Departamentos com responsável e contagem de membros", body = [DepartmentSummary]),
        (status = 403, description = "Não é membro")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_departments(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<DepartmentSummary>>, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Viewer)
        .await?;

    let departments = app_state
        .department_service
        .list_departments(org_id)
        .await?;
    Ok(Json(departments))
}

// POST /api/organizations/{id}/departments
#[utoipa::path(
    post,
    path = "/api/organizations/{id}/departments",
    tag = "Departments",
    params(("id" = Uuid, Path, description = "ID da organização")),
    request_body = CreateDepartmentPayload,
    responses(
        (status = 201, description = "Departamento criado", body = Department),
        (status = 403, description = "Papel insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_department(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateDepartmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let department = app_state
        .department_service
        .create_department(org_id, &payload.name, payload.head_user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

// PUT /api/organizations/{id}/departments/{dept_id}
#[utoipa::path(
    put,
    path = "/api/organizations/{id}/departments/{dept_id}",
    tag = "Departments",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("dept_id" = Uuid, Path, description = "ID do departamento")
    ),
    request_body = UpdateDepartmentPayload,
    responses(
        (status = 200, description = "Departamento atualizado", body = Department),
        (status = 404, description = "Departamento não pertence à organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_department(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, dept_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateDepartmentPayload>,
) -> Result<Json<Department>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let department = app_state
        .department_service
        .update_department(org_id, dept_id, payload.name.as_deref(), payload.head_user_id)
        .await?;
    Ok(Json(department))
}

// DELETE /api/organizations/{id}/departments/{dept_id}
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}/departments/{dept_id}",
    tag = "Departments",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("dept_id" = Uuid, Path, description = "ID do departamento")
    ),
    responses(
        (status = 204, description = "Departamento desativado e membros desvinculados"),
        (status = 404, description = "Departamento não pertence à organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_department(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, dept_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    app_state
        .department_service
        .delete_department(org_id, dept_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/organizations/{id}/departments/{dept_id}/members
#[utoipa::path(
    post,
    path = "/api/organizations/{id}/departments/{dept_id}/members",
    tag = "Departments",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("dept_id" = Uuid, Path, description = "ID do departamento")
    ),
    request_body = AssignMemberPayload,
    responses(
        (status = 200, description = "Membro movido para o departamento", body = Membership),
        (status = 404, description = "Membro ou departamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_member(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, dept_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AssignMemberPayload>,
) -> Result<Json<Membership>, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let membership = app_state
        .department_service
        .assign_member(org_id, payload.user_id, Some(dept_id))
        .await?;
    Ok(Json(membership))
}

// DELETE /api/organizations/{id}/departments/{dept_id}/members/{user_id}
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}/departments/{dept_id}/members/{user_id}",
    tag = "Departments",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("dept_id" = Uuid, Path, description = "ID do departamento"),
        ("user_id" = Uuid, Path, description = "ID do usuário")
    ),
    responses(
        (status = 200, description = "Membro desvinculado do departamento", body = Membership),
        (status = 404, description = "Membro não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn unassign_member(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, _dept_id, user_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<Membership>, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let membership = app_state
        .department_service
        .assign_member(org_id, user_id, None)
        .await?;
    Ok(Json(membership))
}
