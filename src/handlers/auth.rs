// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::Authenticated,
        rbac::{MinViewer, RequireRole},
    },
    models::{
        auth::{
            LoginPayload, LoginResponse, RefreshPayload, RegisterPayload, SelectedOrganization,
            TokenKind, TokenResponse, UpdateProfilePayload, User, UsernameLoginPayload,
        },
        session::SessionTokens,
        tenancy::{OrganizationWithRole, Role},
    },
};

// ---
// Payloads locais deste handler
// ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectOrganizationPayload {
    pub organization_id: Uuid,
}

// ---
// Rotas públicas
// ---

// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Conta criada; sessão inicial emitida", body = LoginResponse),
        (status = 409, description = "E-mail já cadastrado")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user = app_state
        .auth_service
        .create_user(&payload.password, &payload.full_name, None, Some(&payload.email))
        .await?;

    // Auto-login: o registro já devolve uma sessão utilizável (sem organização)
    let tokens = app_state.auth_service.create_session(user.id, None).await?;

    Ok((
        StatusCode::CREATED,
        Json(login_response(tokens, user, None)),
    ))
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Sessão emitida", body = LoginResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Não é membro da organização pedida")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (tokens, user) = app_state
        .auth_service
        .login(&payload.email, &payload.password, payload.organization_id)
        .await?;

    let organization = selected_organization(&app_state, &tokens, user.id).await?;
    Ok(Json(login_response(tokens, user, organization)))
}

// POST /api/auth/login-with-username
#[utoipa::path(
    post,
    path = "/api/auth/login-with-username",
    tag = "Auth",
    request_body = UsernameLoginPayload,
    responses(
        (status = 200, description = "Sessão emitida já com organização", body = LoginResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Não é membro da organização")
    )
)]
pub async fn login_with_username(
    State(app_state): State<AppState>,
    Json(payload): Json<UsernameLoginPayload>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (tokens, user) = app_state
        .auth_service
        .login_with_username(&payload.username, &payload.password, payload.organization_id)
        .await?;

    let organization = selected_organization(&app_state, &tokens, user.id).await?;
    Ok(Json(login_response(tokens, user, organization)))
}

// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshPayload,
    responses(
        (status = 200, description = "Sessão rotacionada; novo par de tokens", body = TokenResponse),
        (status = 401, description = "Refresh token inválido, expirado ou já usado")
    )
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<TokenResponse>, AppError> {
    let claims = app_state.token_codec.decode(&payload.refresh_token)?;
    if !app_state.token_codec.verify_kind(&claims, TokenKind::Refresh) {
        return Err(AppError::InvalidRefreshToken);
    }

    let (tokens, _user) = app_state.auth_service.refresh(claims.jti).await?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "bearer",
        expires_in: tokens.expires_in,
    }))
}

// POST /api/auth/logout
//
// Rota pública de propósito: logout é idempotente, e um access token de
// sessão JÁ revogada também recebe 204 (o guard de autenticação devolveria
// 401 e quebraria essa propriedade).
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Sessão revogada (ou já estava)"),
        (status = 401, description = "Token ilegível")
    ),
    security(("api_jwt" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, AppError> {
    let claims = app_state.token_codec.decode(bearer.token())?;
    if !app_state.token_codec.verify_kind(&claims, TokenKind::Access) {
        return Err(AppError::InvalidToken);
    }

    app_state.auth_service.logout(claims.jti).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Rotas protegidas (atrás do auth_middleware)
// ---

// POST /api/auth/select-organization
#[utoipa::path(
    post,
    path = "/api/auth/select-organization",
    tag = "Auth",
    request_body = SelectOrganizationPayload,
    responses(
        (status = 200, description = "Nova sessão atrelada à organização", body = LoginResponse),
        (status = 403, description = "Não é membro da organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn select_organization(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<SelectOrganizationPayload>,
) -> Result<Json<LoginResponse>, AppError> {
    let tokens = app_state
        .auth_service
        .switch_organization(ctx.user.id, payload.organization_id, ctx.access_jti)
        .await?;

    let organization = selected_organization(&app_state, &tokens, ctx.user.id).await?;
    Ok(Json(login_response(tokens, ctx.user, organization)))
}

// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Dados do usuário autenticado", body = LoginContextResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(Authenticated(ctx): Authenticated) -> Json<LoginContextResponse> {
    let organization = match (&ctx.organization, &ctx.membership) {
        (Some(org), Some(membership)) => Some(SelectedOrganization {
            id: org.id,
            name: org.name.clone(),
            slug: org.slug.clone(),
            role: membership.role,
        }),
        _ => None,
    };

    Json(LoginContextResponse {
        user: ctx.user,
        organization,
    })
}

// Resposta do /me: o usuário + a organização selecionada na sessão corrente
#[derive(Debug, serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginContextResponse {
    pub user: User,
    pub organization: Option<SelectedOrganization>,
}

// GET /api/auth/organization
//
// A organização selecionada na sessão corrente. O gate exige que a sessão
// tenha uma organização (senão 400) — qualquer papel serve.
#[utoipa::path(
    get,
    path = "/api/auth/organization",
    tag = "Auth",
    responses(
        (status = 200, description = "Organização selecionada na sessão", body = SelectedOrganization),
        (status = 400, description = "Sessão sem organização selecionada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_current_organization(
    RequireRole(ctx, _): RequireRole<MinViewer>,
) -> Result<Json<SelectedOrganization>, AppError> {
    // O gate garante membership + organização presentes
    let (org, membership) = ctx
        .organization
        .as_ref()
        .zip(ctx.membership.as_ref())
        .ok_or(AppError::OrganizationRequired)?;

    Ok(Json(SelectedOrganization {
        id: org.id,
        name: org.name.clone(),
        slug: org.slug.clone(),
        role: membership.role,
    }))
}

// GET /api/auth/organizations
#[utoipa::path(
    get,
    path = "/api/auth/organizations",
    tag = "Auth",
    responses(
        (status = 200, description = "Organizações do usuário, com o papel em cada uma", body = [OrganizationWithRole])
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_organizations(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<Vec<OrganizationWithRole>>, AppError> {
    let organizations = app_state
        .tenant_service
        .list_user_organizations(ctx.user.id)
        .await?;
    Ok(Json(organizations))
}

// PATCH /api/auth/profile
#[utoipa::path(
    patch,
    path = "/api/auth/profile",
    tag = "Auth",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Perfil atualizado", body = User),
        (status = 401, description = "Senha atual incorreta")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_profile(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<User>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user = app_state
        .auth_service
        .update_profile(
            &ctx,
            payload.full_name.as_deref(),
            payload.current_password.as_deref(),
            payload.new_password.as_deref(),
        )
        .await?;

    Ok(Json(user))
}

// ---
// Helpers de resposta
// ---

fn login_response(
    tokens: SessionTokens,
    user: User,
    organization: Option<SelectedOrganization>,
) -> LoginResponse {
    LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "bearer",
        expires_in: tokens.expires_in,
        user,
        organization,
    }
}

// Monta o bloco "organização selecionada" quando a sessão nasceu com uma.
async fn selected_organization(
    app_state: &AppState,
    tokens: &SessionTokens,
    user_id: Uuid,
) -> Result<Option<SelectedOrganization>, AppError> {
    let Some(org_id) = tokens.session.organization_id else {
        return Ok(None);
    };

    let organization = app_state.tenant_service.get_organization(org_id).await?;
    // Qualquer papel serve: a membership já foi validada no login/troca
    let membership = app_state
        .tenant_service
        .check_permission(user_id, org_id, Role::Viewer)
        .await?;

    Ok(Some(SelectedOrganization {
        id: organization.id,
        name: organization.name,
        slug: organization.slug,
        role: membership.role,
    }))
}
