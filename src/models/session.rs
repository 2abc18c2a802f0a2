// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Uma linha do ledger de sessões: um registro por ciclo login/refresh.
// A expiração acompanha a janela do ACCESS token; o refresh sempre
// rotaciona a sessão, então a linha nunca sobrevive além dessa janela
// como sessão "corrente".
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_jti: Uuid,
    pub refresh_token_jti: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Sessão recém-criada + as strings assinadas, que só existem em trânsito
// na resposta (nunca vão para o banco).
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub session: Session,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
