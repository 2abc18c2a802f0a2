// src/services/token.rs

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Settings,
    models::auth::{Claims, TokenKind},
};

/// Codec de tokens: emite e valida os dois tipos de token (access, curto;
/// refresh, longo) sobre um segredo simétrico compartilhado. Função pura —
/// nenhum efeito colateral, nenhum I/O. "Sessão inexistente" NÃO é problema
/// daqui: isso é responsabilidade do ledger de sessões, uma camada acima.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// Token recém-emitido: a string assinada + o jti que serve de chave no
/// ledger de sessões.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: chrono::DateTime<Utc>,
}

impl TokenCodec {
    pub fn new(settings: &Settings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            access_ttl: Duration::minutes(settings.access_token_expire_minutes),
            refresh_ttl: Duration::days(settings.refresh_token_expire_days),
        }
    }

    /// Emite um token do tipo pedido. O jti é um UUID v4 fresco — aleatório,
    /// não derivado do conteúdo. Apenas access tokens carregam organização.
    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<IssuedToken, AppError> {
        let jti = Uuid::new_v4();
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user_id,
            jti,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            kind,
            org_id: match kind {
                TokenKind::Access => organization_id,
                TokenKind::Refresh => None,
            },
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )?;

        Ok(IssuedToken { token, jti, expires_at })
    }

    /// Decodifica e verifica assinatura + expiração.
    /// Assinatura inválida -> InvalidToken; expirado -> ExpiredToken.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
            _ => AppError::InvalidToken,
        })
    }

    /// Confere o discriminador de tipo. O codec NÃO faz isso sozinho no
    /// decode: quem chama precisa checar explicitamente.
    pub fn verify_kind(&self, claims: &Claims, expected: TokenKind) -> bool {
        claims.kind == expected
    }

    /// Segundos de validade de um access token (o `expires_in` das respostas).
    pub fn access_expires_in(&self) -> i64 {
        self.access_ttl.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        let settings = Settings {
            database_url: "postgres://unused".into(),
            jwt_secret: "segredo-de-teste".into(),
            access_token_expire_minutes: 60,
            refresh_token_expire_days: 30,
            password_min_length: 8,
            password_max_length: 128,
            session_sweep_interval_secs: 3600,
            bind_addr: "127.0.0.1:0".into(),
        };
        TokenCodec::new(&settings)
    }

    #[test]
    fn roundtrip_preserva_subject_tipo_e_organizacao() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let issued = codec
            .issue(TokenKind::Access, user_id, Some(org_id))
            .unwrap();
        let claims = codec.decode(&issued.token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.org_id, Some(org_id));
    }

    #[test]
    fn refresh_token_nunca_carrega_organizacao() {
        let codec = codec();
        let issued = codec
            .issue(TokenKind::Refresh, Uuid::new_v4(), Some(Uuid::new_v4()))
            .unwrap();
        let claims = codec.decode(&issued.token).unwrap();

        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.org_id, None);
    }

    #[test]
    fn jtis_sao_sempre_frescos() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let a = codec.issue(TokenKind::Access, user_id, None).unwrap();
        let b = codec.issue(TokenKind::Access, user_id, None).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn assinatura_de_outro_segredo_falha_com_invalid_token() {
        let codec_a = codec();
        let settings = Settings {
            database_url: "postgres://unused".into(),
            jwt_secret: "outro-segredo".into(),
            access_token_expire_minutes: 60,
            refresh_token_expire_days: 30,
            password_min_length: 8,
            password_max_length: 128,
            session_sweep_interval_secs: 3600,
            bind_addr: "127.0.0.1:0".into(),
        };
        let codec_b = TokenCodec::new(&settings);

        let issued = codec_a.issue(TokenKind::Access, Uuid::new_v4(), None).unwrap();
        match codec_b.decode(&issued.token) {
            Err(AppError::InvalidToken) => {}
            other => panic!("esperava InvalidToken, veio {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn token_expirado_falha_com_expired_token() {
        let codec = codec();
        // Monta manualmente um token com exp bem no passado (além do leeway
        // padrão do validador).
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            iat: (now - Duration::hours(3)).timestamp(),
            exp: (now - Duration::hours(2)).timestamp(),
            kind: TokenKind::Access,
            org_id: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("segredo-de-teste".as_ref()),
        )
        .unwrap();

        match codec.decode(&token) {
            Err(AppError::ExpiredToken) => {}
            other => panic!("esperava ExpiredToken, veio {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn verificacao_de_tipo_e_explicita() {
        let codec = codec();
        let issued = codec.issue(TokenKind::Refresh, Uuid::new_v4(), None).unwrap();
        let claims = codec.decode(&issued.token).unwrap();

        // decode aceita qualquer tipo; a checagem é de quem chama.
        assert!(codec.verify_kind(&claims, TokenKind::Refresh));
        assert!(!codec.verify_kind(&claims, TokenKind::Access));
    }
}
