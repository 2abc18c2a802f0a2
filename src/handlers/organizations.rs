// src/handlers/organizations.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::Authenticated,
    models::{
        auth::{LoginResponse, SelectedOrganization},
        tenancy::{
            ChangeRolePayload, CreateMemberPayload, CreateOrganizationPayload, JoinOrganizationPayload,
            MemberRecord, Membership, Organization, OrganizationStats, Role, UpdateOrganizationPayload,
        },
    },
};

// ---
// Payloads e respostas locais
// ---

// Visão pública de uma organização (fluxo de join: quem tem o código ainda
// não é membro, então não vê o resto)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationPublic {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinPayload {
    #[validate(length(min = 1, max = 6, message = "O código de acesso é obrigatório."))]
    pub access_code: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub account: JoinOrganizationPayload,
}

#[derive(Debug, Deserialize)]
pub struct ListMembersQuery {
    // Por padrão só membros ativos; ?include_inactive=true traz todos
    #[serde(default)]
    pub include_inactive: bool,
}

// Criação de organização + membership de dono
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrganizationResponse {
    pub organization: Organization,
    pub membership: Membership,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMemberResponse {
    pub user_id: Uuid,
    pub membership: Membership,
}

// ---
// Organizações
// ---

// POST /api/organizations
#[utoipa::path(
    post,
    path = "/api/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationPayload,
    responses(
        (status = 201, description = "Organização criada; o criador é o dono", body = CreatedOrganizationResponse),
        (status = 409, description = "Slug já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_organization(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<CreateOrganizationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (organization, membership) = app_state
        .tenant_service
        .create_organization(ctx.user.id, &payload.name, payload.slug.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrganizationResponse { organization, membership }),
    ))
}

// GET /api/organizations/{id}
#[utoipa::path(
    get,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "ID da organização")),
    responses(
        (status = 200, description = "Dados da organização", body = Organization),
        (status = 403, description = "Não é membro")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_organization(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Organization>, AppError> {
    // Qualquer membro ativo pode ver a própria organização
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Viewer)
        .await?;

    let organization = app_state.tenant_service.get_organization(org_id).await?;
    Ok(Json(organization))
}

// GET /api/organizations/by-code/{code}
//
// Rota pública: alimenta a tela de join, antes de existir conta.
#[utoipa::path(
    get,
    path = "/api/organizations/by-code/{code}",
    tag = "Organizations",
    params(("code" = String, Path, description = "Código de acesso de 6 caracteres")),
    responses(
        (status = 200, description = "Organização do código", body = OrganizationPublic),
        (status = 404, description = "Código desconhecido")
    )
)]
pub async fn get_organization_by_code(
    State(app_state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<OrganizationPublic>, AppError> {
    let organization = app_state
        .tenant_service
        .get_organization_by_access_code(&code)
        .await?;

    Ok(Json(OrganizationPublic {
        id: organization.id,
        name: organization.name,
        slug: organization.slug,
    }))
}

// POST /api/organizations/join
//
// Auto-registro: cria a conta, vincula como 'member' e já emite a sessão
// atrelada à organização. Público por natureza.
#[utoipa::path(
    post,
    path = "/api/organizations/join",
    tag = "Organizations",
    request_body = JoinPayload,
    responses(
        (status = 201, description = "Conta criada e vinculada; sessão emitida", body = LoginResponse),
        (status = 404, description = "Código desconhecido"),
        (status = 409, description = "Username já em uso")
    )
)]
pub async fn join_organization(
    State(app_state): State<AppState>,
    Json(payload): Json<JoinPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (user, organization, membership) = app_state
        .tenant_service
        .join_by_access_code(
            &payload.access_code,
            &payload.account.username,
            &payload.account.password,
            &payload.account.full_name,
        )
        .await?;

    let tokens = app_state
        .auth_service
        .create_session(user.id, Some(organization.id))
        .await?;

    let response = LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "bearer",
        expires_in: tokens.expires_in,
        user,
        organization: Some(SelectedOrganization {
            id: organization.id,
            name: organization.name,
            slug: organization.slug,
            role: membership.role,
        }),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

// PUT /api/organizations/{id}
#[utoipa::path(
    put,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "ID da organização")),
    request_body = UpdateOrganizationPayload,
    responses(
        (status = 200, description = "Organização atualizada", body = Organization),
        (status = 403, description = "Papel insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_organization(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<UpdateOrganizationPayload>,
) -> Result<Json<Organization>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let organization = app_state
        .tenant_service
        .update_organization(org_id, &payload.name)
        .await?;
    Ok(Json(organization))
}

// DELETE /api/organizations/{id}
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "ID da organização")),
    responses(
        (status = 204, description = "Organização desativada"),
        (status = 403, description = "Apenas donos podem apagar")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_organization(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Owner)
        .await?;

    app_state.tenant_service.delete_organization(org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Membros
// ---

// GET /api/organizations/{id}/members
#[utoipa::path(
    get,
    path = "/api/organizations/{id}/members",
    tag = "Organizations",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("include_inactive" = Option<bool>, Query, description = "Inclui ex-membros")
    ),
    responses(
        (status = 200, description = "Membros da organização", body = [MemberRecord]),
        (status = 403, description = "Não é membro")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_members(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListMembersQuery>,
) -> Result<Json<Vec<MemberRecord>>, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Viewer)
        .await?;

    let members = app_state
        .tenant_service
        .list_members(org_id, !query.include_inactive)
        .await?;
    Ok(Json(members))
}

// POST /api/organizations/{id}/members
#[utoipa::path(
    post,
    path = "/api/organizations/{id}/members",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "ID da organização")),
    request_body = CreateMemberPayload,
    responses(
        (status = 201, description = "Conta criada e vinculada", body = CreatedMemberResponse),
        (status = 403, description = "Papel insuficiente"),
        (status = 409, description = "Username já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_member(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateMemberPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let actor = app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    // Conceder 'owner' é prerrogativa de dono
    if payload.role == Role::Owner && actor.role < Role::Owner {
        return Err(AppError::InsufficientRole(Role::Owner.as_str()));
    }

    let (user, membership) = app_state
        .tenant_service
        .create_and_add_user(
            org_id,
            &payload.username,
            &payload.password,
            &payload.full_name,
            payload.email.as_deref(),
            payload.role,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedMemberResponse { user_id: user.id, membership }),
    ))
}

// DELETE /api/organizations/{id}/members/{user_id}
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}/members/{user_id}",
    tag = "Organizations",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("user_id" = Uuid, Path, description = "ID do usuário a remover")
    ),
    responses(
        (status = 204, description = "Membro removido"),
        (status = 403, description = "Papel insuficiente"),
        (status = 409, description = "Última pessoa dona da organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_member(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, target_user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let actor = app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    // Mexer em um dono exige ser dono
    let target = app_state
        .tenant_service
        .check_permission(target_user_id, org_id, Role::Viewer)
        .await
        .map_err(|_| AppError::MembershipNotFound)?;
    if target.role == Role::Owner && actor.role < Role::Owner {
        return Err(AppError::InsufficientRole(Role::Owner.as_str()));
    }

    app_state
        .tenant_service
        .remove_member(org_id, target_user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/organizations/{id}/members/{user_id}/role
#[utoipa::path(
    patch,
    path = "/api/organizations/{id}/members/{user_id}/role",
    tag = "Organizations",
    params(
        ("id" = Uuid, Path, description = "ID da organização"),
        ("user_id" = Uuid, Path, description = "ID do usuário")
    ),
    request_body = ChangeRolePayload,
    responses(
        (status = 200, description = "Papel atualizado", body = Membership),
        (status = 403, description = "Papel insuficiente"),
        (status = 409, description = "Rebaixaria a última pessoa dona")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_member_role(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((org_id, target_user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChangeRolePayload>,
) -> Result<Json<Membership>, AppError> {
    let actor = app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let target = app_state
        .tenant_service
        .check_permission(target_user_id, org_id, Role::Viewer)
        .await
        .map_err(|_| AppError::MembershipNotFound)?;

    // Conceder ou revogar 'owner' é prerrogativa de dono
    if (payload.role == Role::Owner || target.role == Role::Owner) && actor.role < Role::Owner {
        return Err(AppError::InsufficientRole(Role::Owner.as_str()));
    }

    let membership = app_state
        .tenant_service
        .change_member_role(org_id, target_user_id, payload.role)
        .await?;
    Ok(Json(membership))
}

// GET /api/organizations/{id}/stats
#[utoipa::path(
    get,
    path = "/api/organizations/{id}/stats",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "ID da organização")),
    responses(
        (status = 200, description = "Contagens por papel + diálogos", body = OrganizationStats),
        (status = 403, description = "Papel insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_organization_stats(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationStats>, AppError> {
    app_state
        .tenant_service
        .check_permission(ctx.user.id, org_id, Role::Admin)
        .await?;

    let stats = app_state
        .tenant_service
        .get_organization_stats(org_id)
        .await?;
    Ok(Json(stats))
}
