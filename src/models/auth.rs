// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;
use crate::models::tenancy::{Membership, Organization, Role};

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    pub password_hash: String,

    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

// ---
// Tokens
// ---

// O discriminador de tipo dentro do JWT: um refresh token nunca pode ser
// aceito onde se espera um access token, e vice-versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub jti: Uuid,  // ID aleatório do token: a chave de busca no ledger de sessões
    pub iat: i64,   // Issued At
    pub exp: i64,   // Expiration time
    #[serde(rename = "type")]
    pub kind: TokenKind,
    // Apenas em access tokens: a organização selecionada na sessão
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
}

// ---
// Contexto de autorização
// ---

/// O resultado da resolução de um bearer token pelo middleware:
/// usuário ativo + sessão ativa + (opcionalmente) organização e papel.
/// É este objeto que a lógica de negócio consome para filtrar consultas
/// e aplicar os "role gates".
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session_id: Uuid,
    pub access_jti: Uuid,
    pub organization: Option<Organization>,
    pub membership: Option<Membership>,
}

impl AuthContext {
    /// Papel do usuário na organização selecionada, se houver.
    pub fn role(&self) -> Option<Role> {
        self.membership.as_ref().map(|m| m.role)
    }

    pub fn is_owner(&self) -> bool {
        self.role() == Some(Role::Owner)
    }

    pub fn can_manage_members(&self) -> bool {
        self.role().is_some_and(|r| r.can_manage_members())
    }

    pub fn can_manage_dialogs(&self) -> bool {
        self.role().is_some_and(|r| r.can_manage_dialogs())
    }

    pub fn can_view_dialogs(&self) -> bool {
        self.role().is_some_and(|r| r.can_view_dialogs())
    }

    /// Role gate reutilizável: rejeita quando o nível do papel do contexto
    /// fica abaixo do mínimo exigido.
    pub fn require_role(&self, minimum: Role) -> Result<Role, AppError> {
        let role = self.role().ok_or(AppError::OrganizationRequired)?;
        if role >= minimum {
            Ok(role)
        } else {
            Err(AppError::InsufficientRole(minimum.as_str()))
        }
    }
}

// ---
// Payloads
// ---

// Dados para registro de um novo usuário (por e-mail)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "A senha deve ter entre 8 e 128 caracteres."))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "O nome completo é obrigatório."))]
    pub full_name: String,
}

// Dados para login por e-mail
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 1, message = "A senha é obrigatória."))]
    pub password: String,
    // Organização a selecionar já no login (opcional)
    pub organization_id: Option<Uuid>,
}

// Login por username: sempre atrelado a uma organização
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UsernameLoginPayload {
    #[validate(length(min = 1, message = "O username é obrigatório."))]
    pub username: String,
    #[validate(length(min = 1, message = "A senha é obrigatória."))]
    pub password: String,
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfilePayload {
    #[validate(length(min = 1, max = 255, message = "O nome completo não pode ser vazio."))]
    pub full_name: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(min = 8, max = 128, message = "A senha deve ter entre 8 e 128 caracteres."))]
    pub new_password: Option<String>,
}

// ---
// Respostas
// ---

// Organização selecionada, como aparece nas respostas de login
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOrganization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub role: Role,
}

// O par de tokens devolvido por toda transição que emite tokens.
// As strings assinadas NUNCA são persistidas: a linha de sessão só guarda jtis.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
    pub organization: Option<SelectedOrganization>,
}
