// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::login_with_username,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::select_organization,
        handlers::auth::get_me,
        handlers::auth::get_current_organization,
        handlers::auth::get_my_organizations,
        handlers::auth::update_profile,

        // --- Organizations ---
        handlers::organizations::create_organization,
        handlers::organizations::get_organization,
        handlers::organizations::get_organization_by_code,
        handlers::organizations::join_organization,
        handlers::organizations::update_organization,
        handlers::organizations::delete_organization,
        handlers::organizations::list_members,
        handlers::organizations::create_member,
        handlers::organizations::remove_member,
        handlers::organizations::change_member_role,
        handlers::organizations::get_organization_stats,

        // --- Departments ---
        handlers::departments::list_departments,
        handlers::departments::create_department,
        handlers::departments::update_department,
        handlers::departments::delete_department,
        handlers::departments::assign_member,
        handlers::departments::unassign_member,

        // --- Dialogs ---
        handlers::dialogs::list_dialogs,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::UsernameLoginPayload,
            models::auth::RefreshPayload,
            models::auth::UpdateProfilePayload,
            models::auth::SelectedOrganization,
            models::auth::TokenResponse,
            models::auth::LoginResponse,
            handlers::auth::SelectOrganizationPayload,
            handlers::auth::LoginContextResponse,

            // --- Tenancy ---
            models::tenancy::Role,
            models::tenancy::Organization,
            models::tenancy::Membership,
            models::tenancy::Department,
            models::tenancy::DepartmentSummary,
            models::tenancy::OrganizationWithRole,
            models::tenancy::MemberRecord,
            models::tenancy::OrganizationStats,
            models::tenancy::CreateOrganizationPayload,
            models::tenancy::UpdateOrganizationPayload,
            models::tenancy::CreateMemberPayload,
            models::tenancy::ChangeRolePayload,
            models::tenancy::JoinOrganizationPayload,
            handlers::organizations::OrganizationPublic,
            handlers::organizations::JoinPayload,
            handlers::organizations::CreatedOrganizationResponse,
            handlers::organizations::CreatedMemberResponse,

            // --- Departments ---
            handlers::departments::CreateDepartmentPayload,
            handlers::departments::UpdateDepartmentPayload,
            handlers::departments::AssignMemberPayload,

            // --- Dialogs ---
            models::dialog::Dialog,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação, sessões e perfil"),
        (name = "Organizations", description = "Organizações, membros e papéis"),
        (name = "Departments", description = "Departamentos dentro de uma organização"),
        (name = "Dialogs", description = "Diálogos visíveis para o usuário")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
