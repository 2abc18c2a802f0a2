use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// A taxonomia cobre autenticação, revogação de sessão e autorização
// por organização; erros de infraestrutura (banco, hashing) ficam
// separados para o cliente distinguir "não autorizado" de "indisponível".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Validações feitas à mão no serviço (tamanho de senha, identificador ausente...)
    #[error("Entrada inválida: {0}")]
    Validation(String),

    #[error("Já existe: {0}")]
    AlreadyExists(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Token expirado")]
    ExpiredToken,

    // O token ainda é criptograficamente válido, mas a sessão por trás dele
    // foi revogada (logout, rotação ou sign-out forçado).
    #[error("Sessão revogada")]
    RevokedSession,

    #[error("Refresh token inválido")]
    InvalidRefreshToken,

    #[error("Usuário não é membro desta organização")]
    NotAMember,

    #[error("Papel insuficiente: requer '{0}' ou superior")]
    InsufficientRole(&'static str),

    #[error("Uma organização precisa de pelo menos um dono ativo")]
    LastOwner,

    // Rotas org-scoped que exigem uma organização selecionada no token
    #[error("Nenhuma organização selecionada")]
    OrganizationRequired,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Organização não encontrada")]
    OrganizationNotFound,

    #[error("Membro não encontrado")]
    MembershipNotFound,

    #[error("Departamento não encontrado")]
    DepartmentNotFound,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::Validation(msg) => {
                let body = Json(json!({ "error": msg }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::AlreadyExists(msg) => {
                let body = Json(json!({ "error": msg }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::InsufficientRole(role) => {
                let body = Json(json!({
                    "error": format!("Você precisa do papel '{}' ou superior para esta ação.", role)
                }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }

            // Nunca revelamos qual parte da checagem falhou: identificador
            // desconhecido e senha errada colapsam na mesma mensagem.
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Identificador ou senha inválidos.")
            }
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.")
            }
            // Expirado e revogado têm o MESMO efeito observável para o
            // cliente: autentique-se de novo (ou use o refresh token).
            AppError::ExpiredToken | AppError::RevokedSession => {
                (StatusCode::UNAUTHORIZED, "Sessão expirada ou revogada. Autentique-se novamente.")
            }
            AppError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Refresh token inválido ou já utilizado.")
            }
            AppError::NotAMember => {
                (StatusCode::FORBIDDEN, "Você não é membro desta organização.")
            }
            AppError::LastOwner => {
                (StatusCode::CONFLICT, "Uma organização precisa de pelo menos um dono ativo.")
            }
            AppError::OrganizationRequired => {
                (StatusCode::BAD_REQUEST, "Selecione uma organização antes de usar esta rota.")
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado."),
            AppError::OrganizationNotFound => {
                (StatusCode::NOT_FOUND, "Organização não encontrada.")
            }
            AppError::MembershipNotFound => (StatusCode::NOT_FOUND, "Membro não encontrado."),
            AppError::DepartmentNotFound => {
                (StatusCode::NOT_FOUND, "Departamento não encontrado.")
            }

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn erros_de_autenticacao_viram_401() {
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::ExpiredToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::RevokedSession), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::InvalidRefreshToken), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expirado_e_revogado_sao_indistinguiveis_para_o_cliente() {
        assert_eq!(
            status_of(AppError::ExpiredToken),
            status_of(AppError::RevokedSession)
        );
    }

    #[test]
    fn erros_de_autorizacao_viram_403() {
        assert_eq!(status_of(AppError::NotAMember), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::InsufficientRole("admin")), StatusCode::FORBIDDEN);
    }

    #[test]
    fn conflitos_sao_terminais() {
        assert_eq!(
            status_of(AppError::AlreadyExists("slug em uso".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AppError::LastOwner), StatusCode::CONFLICT);
    }
}
