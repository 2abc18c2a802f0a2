// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. Role (O papel do membro dentro da organização)
// ---
// Hierarquia fechada com ordem total: owner > admin > member > viewer.
// A ordem dos variantes foi escolhida para o `Ord` derivado coincidir com
// a hierarquia (Viewer é o menor, Owner o maior).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Error)]
#[error("Papel desconhecido: {0}")]
pub struct ParseRoleError(String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    /// Nível numérico da hierarquia (owner=4 ... viewer=1).
    pub fn level(&self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Member => 2,
            Role::Viewer => 1,
        }
    }

    pub fn can_manage_members(&self) -> bool {
        *self >= Role::Admin
    }

    pub fn can_manage_dialogs(&self) -> bool {
        *self >= Role::Member
    }

    pub fn can_view_dialogs(&self) -> bool {
        *self >= Role::Viewer
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// A coluna `role` é VARCHAR com CHECK constraint; mapeamos o enum
// manualmente para texto em vez de criar um tipo Postgres dedicado.
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<Role>().map_err(Into::into)
    }
}

// ---
// 2. Organization (O tenant)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    // Identificador único amigável para URLs
    pub slug: String,
    // Código de 6 caracteres usado no link de auto-registro e no login por username
    pub access_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 3. Membership (A "ponte" Usuário-Organização, com papel)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub department_id: Option<Uuid>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 4. Department (Agrupamento opcional dentro da organização)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub head_user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Departamento com os dados agregados que a listagem devolve
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub head_user_id: Option<Uuid>,
    pub head_user_name: Option<String>,
    pub member_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---
// 5. Projeções de leitura (joins)
// ---

// Organização + papel do usuário nela (listagem "minhas organizações")
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationWithRole {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub role: Role,
}

// Linha de membro: usuário + dados da membership
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

// Contagens agregadas (relatórios, fora do hot path de autorização)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationStats {
    pub total_members: i64,
    pub owners: i64,
    pub admins: i64,
    pub members: i64,
    pub viewers: i64,
    pub dialogs: i64,
}

// ---
// 6. Payloads (os "formulários" da API)
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrganizationPayload {
    #[validate(length(min = 1, max = 255, message = "O nome da organização é obrigatório."))]
    pub name: String,
    // Gerado a partir do nome quando ausente
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrganizationPayload {
    #[validate(length(min = 1, max = 255, message = "O nome da organização é obrigatório."))]
    pub name: String,
}

// Criação direta de conta por um admin da organização (sem convite por e-mail)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMemberPayload {
    #[validate(length(min = 1, max = 100, message = "O username é obrigatório."))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "A senha deve ter entre 8 e 128 caracteres."))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "O nome completo é obrigatório."))]
    pub full_name: String,
    pub role: Role,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRolePayload {
    pub role: Role,
}

// Auto-registro via código de acesso da organização
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinOrganizationPayload {
    #[validate(length(min = 1, max = 100, message = "O username é obrigatório."))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "A senha deve ter entre 8 e 128 caracteres."))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "O nome completo é obrigatório."))]
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarquia_tem_ordem_total() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Member);
        assert!(Role::Member > Role::Viewer);
        assert_eq!(Role::Owner.level(), 4);
        assert_eq!(Role::Viewer.level(), 1);
    }

    #[test]
    fn papel_superior_satisfaz_o_inferior() {
        assert!(Role::Owner.can_manage_members());
        assert!(Role::Admin.can_manage_members());
        assert!(!Role::Member.can_manage_members());

        assert!(Role::Member.can_manage_dialogs());
        assert!(!Role::Viewer.can_manage_dialogs());

        assert!(Role::Viewer.can_view_dialogs());
    }

    #[test]
    fn role_roundtrip_em_texto() {
        for role in [Role::Owner, Role::Admin, Role::Member, Role::Viewer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("gerente".parse::<Role>().is_err());
    }
}
