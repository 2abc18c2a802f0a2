// src/services/auth.rs

use bcrypt::{hash, verify};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Settings,
    db::{SessionRepository, TenancyRepository, UserRepository},
    models::{
        auth::{AuthContext, TokenKind, User},
        session::SessionTokens,
    },
    services::token::TokenCodec,
};

/// Serviço de identidade + orquestrador de sessões.
///
/// A máquina de estados de uma sessão lógica:
/// Anonymous -> Authenticated(sem organização) -> Authenticated(org = X),
/// onde login/refresh/troca de organização sempre ROTACIONAM a sessão
/// (revoga a antiga, cria uma nova) em vez de mutá-la.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    session_repo: SessionRepository,
    tenancy_repo: TenancyRepository,
    codec: TokenCodec,
    password_min_length: usize,
    password_max_length: usize,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        session_repo: SessionRepository,
        tenancy_repo: TenancyRepository,
        codec: TokenCodec,
        settings: &Settings,
        pool: PgPool,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            tenancy_repo,
            codec,
            password_min_length: settings.password_min_length,
            password_max_length: settings.password_max_length,
            pool,
        }
    }

    // ============================================================
    // Identidade
    // ============================================================

    /// Cria uma conta. Pelo menos um identificador (username ou e-mail) é
    /// obrigatório; a senha respeita os limites configurados. Nada é
    /// persistido se a validação falhar.
    pub async fn create_user(
        &self,
        password: &str,
        full_name: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, AppError> {
        self.validate_password(password)?;

        if username.is_none() && email.is_none() {
            return Err(AppError::Validation(
                "Informe pelo menos um username ou e-mail.".into(),
            ));
        }

        // Pré-checagens amigáveis; a constraint UNIQUE do banco continua
        // sendo a garantia final (corridas viram AlreadyExists no INSERT).
        if let Some(username) = username {
            if self.user_repo.find_active_by_username(username).await?.is_some() {
                return Err(AppError::AlreadyExists(
                    "Já existe um usuário com este username.".into(),
                ));
            }
        }
        if let Some(email) = email {
            if self.user_repo.find_active_by_email(email).await?.is_some() {
                return Err(AppError::AlreadyExists(
                    "Já existe um usuário com este e-mail.".into(),
                ));
            }
        }

        let password_hash = hash_password(password.to_owned()).await?;

        self.user_repo
            .create_user(&self.pool, username, email, &password_hash, full_name)
            .await
    }

    /// Autentica por e-mail. "Usuário não existe" e "senha errada" produzem
    /// o MESMO erro — nada de enumeração de contas.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .user_repo
            .find_active_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        self.check_password(password, &user).await
    }

    /// Autentica por username (fluxo de membro de organização).
    pub async fn authenticate_by_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let user = self
            .user_repo
            .find_active_by_username(username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        self.check_password(password, &user).await
    }

    async fn check_password(&self, password: &str, user: &User) -> Result<User, AppError> {
        let password = password.to_owned();
        let password_hash = user.password_hash.clone();

        // Executa a verificação bcrypt fora do runtime (trabalho de CPU)
        let is_valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_valid {
            return Err(AppError::InvalidCredentials);
        }
        Ok(user.clone())
    }

    fn validate_password(&self, password: &str) -> Result<(), AppError> {
        let len = password.chars().count();
        if len < self.password_min_length {
            return Err(AppError::Validation(format!(
                "A senha deve ter no mínimo {} caracteres.",
                self.password_min_length
            )));
        }
        if len > self.password_max_length {
            return Err(AppError::Validation(format!(
                "A senha deve ter no máximo {} caracteres.",
                self.password_max_length
            )));
        }
        Ok(())
    }

    // ============================================================
    // Sessões
    // ============================================================

    /// Emite o par access+refresh e grava a linha de sessão com os dois jtis.
    /// A expiração da sessão acompanha a janela do ACCESS token: o refresh
    /// sempre rotaciona, então a linha nunca precisa viver mais que isso.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<SessionTokens, AppError> {
        self.create_session_with(&self.pool, user_id, organization_id)
            .await
    }

    async fn create_session_with<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<SessionTokens, AppError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let access = self
            .codec
            .issue(TokenKind::Access, user_id, organization_id)?;
        let refresh = self.codec.issue(TokenKind::Refresh, user_id, None)?;

        let session = self
            .session_repo
            .insert(
                executor,
                user_id,
                access.jti,
                refresh.jti,
                organization_id,
                access.expires_at,
            )
            .await?;

        Ok(SessionTokens {
            session,
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.codec.access_expires_in(),
        })
    }

    // ============================================================
    // Transições (login / logout / refresh / troca de organização)
    // ============================================================

    /// Login por e-mail. Se uma organização foi pedida, o usuário precisa
    /// ser membro ativo dela ANTES de a sessão nascer.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        organization_id: Option<Uuid>,
    ) -> Result<(SessionTokens, User), AppError> {
        let user = self.authenticate(email, password).await?;

        if let Some(org_id) = organization_id {
            if !self.tenancy_repo.is_member(user.id, org_id).await? {
                return Err(AppError::NotAMember);
            }
        }

        self.touch_last_login(&user).await;

        let tokens = self.create_session(user.id, organization_id).await?;
        Ok((tokens, user))
    }

    /// Login por username: a organização é OBRIGATÓRIA — este caminho sempre
    /// termina em Authenticated(org = X), nunca no estado sem tenant.
    pub async fn login_with_username(
        &self,
        username: &str,
        password: &str,
        organization_id: Uuid,
    ) -> Result<(SessionTokens, User), AppError> {
        let user = self.authenticate_by_username(username, password).await?;

        if !self.tenancy_repo.is_member(user.id, organization_id).await? {
            return Err(AppError::NotAMember);
        }

        self.touch_last_login(&user).await;

        let tokens = self.create_session(user.id, Some(organization_id)).await?;
        Ok((tokens, user))
    }

    // Best-effort: falha aqui não derruba o login.
    async fn touch_last_login(&self, user: &User) {
        if let Err(e) = self.user_repo.update_last_login(user.id).await {
            tracing::warn!("Falha ao atualizar last_login_at de {}: {}", user.id, e);
        }
    }

    /// Rotação de refresh: o jti antigo vira inútil no instante em que a
    /// sessão antiga é revogada — um refresh token nunca é reutilizável.
    /// Revogar + criar acontecem na MESMA transação.
    pub async fn refresh(&self, refresh_jti: Uuid) -> Result<(SessionTokens, User), AppError> {
        let session = self
            .session_repo
            .find_active_by_refresh_jti(refresh_jti)
            .await?
            .ok_or(AppError::InvalidRefreshToken)?;

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidRefreshToken)?;

        let mut tx = self.pool.begin().await?;
        self.session_repo.revoke(&mut *tx, session.id).await?;
        let tokens = self
            .create_session_with(&mut *tx, user.id, session.organization_id)
            .await?;
        tx.commit().await?;

        Ok((tokens, user))
    }

    /// Logout: revoga a sessão do access jti. Idempotente — já revogada ou
    /// inexistente também é "sucesso".
    pub async fn logout(&self, access_jti: Uuid) -> Result<(), AppError> {
        if let Some(session) = self.session_repo.find_active_by_access_jti(access_jti).await? {
            self.session_repo.revoke(&self.pool, session.id).await?;
        }
        Ok(())
    }

    /// Troca de organização: a ÚNICA forma de mudar o vínculo de tenant de
    /// um token. A membership é checada ANTES de revogar qualquer coisa —
    /// uma troca rejeitada deixa a sessão corrente intacta.
    pub async fn switch_organization(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        current_access_jti: Uuid,
    ) -> Result<SessionTokens, AppError> {
        if !self.tenancy_repo.is_member(user_id, organization_id).await? {
            return Err(AppError::NotAMember);
        }

        let current = self
            .session_repo
            .find_active_by_access_jti(current_access_jti)
            .await?;

        let mut tx = self.pool.begin().await?;
        if let Some(session) = current {
            self.session_repo.revoke(&mut *tx, session.id).await?;
        }
        let tokens = self
            .create_session_with(&mut *tx, user_id, Some(organization_id))
            .await?;
        tx.commit().await?;

        Ok(tokens)
    }

    /// "Sair de todos os dispositivos."
    pub async fn revoke_all_sessions(
        &self,
        user_id: Uuid,
        except_session_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        self.session_repo
            .revoke_all_for_user(&self.pool, user_id, except_session_id)
            .await
    }

    /// Varredura de manutenção: apaga sessões expiradas de vez.
    pub async fn sweep_expired_sessions(&self) -> Result<u64, AppError> {
        self.session_repo.sweep_expired().await
    }

    // ============================================================
    // Perfil
    // ============================================================

    /// Atualiza nome e/ou senha. Trocar a senha exige a senha atual e
    /// revoga as DEMAIS sessões do usuário (a corrente sobrevive).
    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        full_name: Option<&str>,
        current_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<User, AppError> {
        let new_hash = match new_password {
            Some(new_password) => {
                let current = current_password.ok_or_else(|| {
                    AppError::Validation("Informe a senha atual para trocá-la.".into())
                })?;
                // Reaproveita a checagem uniforme de credenciais
                self.check_password(current, &ctx.user).await?;
                self.validate_password(new_password)?;
                Some(hash_password(new_password.to_owned()).await?)
            }
            None => None,
        };

        let updated = self
            .user_repo
            .update_profile(ctx.user.id, full_name, new_hash.as_deref())
            .await?;

        if new_hash.is_some() {
            let revoked = self
                .revoke_all_sessions(ctx.user.id, Some(ctx.session_id))
                .await?;
            tracing::info!(
                "Senha de {} alterada; {} outras sessões revogadas.",
                ctx.user.id,
                revoked
            );
        }

        Ok(updated)
    }

    // ============================================================
    // Resolução de autorização por requisição
    // ============================================================

    /// O pipeline completo de um bearer token até o contexto de autorização:
    /// decode -> type=access -> sessão ativa no ledger -> usuário ativo ->
    /// membership na organização do claim (quando presente).
    ///
    /// Um token com assinatura e validade boas mas sem sessão ativa cai em
    /// RevokedSession — é o ledger que manda, não a criptografia.
    pub async fn resolve_access(&self, token: &str) -> Result<AuthContext, AppError> {
        let claims = self.codec.decode(token)?;

        if !self.codec.verify_kind(&claims, TokenKind::Access) {
            return Err(AppError::InvalidToken);
        }

        let session = self
            .session_repo
            .find_active_by_access_jti(claims.jti)
            .await?
            .ok_or(AppError::RevokedSession)?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::RevokedSession)?;

        let (organization, membership) = match claims.org_id {
            Some(org_id) => {
                let organization = self
                    .tenancy_repo
                    .find_organization_by_id(org_id)
                    .await?
                    .ok_or(AppError::NotAMember)?;
                let membership = self
                    .tenancy_repo
                    .find_active_membership(org_id, user.id)
                    .await?
                    .ok_or(AppError::NotAMember)?;
                (Some(organization), Some(membership))
            }
            None => (None, None),
        };

        Ok(AuthContext {
            user,
            session_id: session.id,
            access_jti: claims.jti,
            organization,
            membership,
        })
    }
}

// Hashing bcrypt fora do runtime, como todo trabalho pesado de CPU.
async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("Falha na task de hashing: {}", e)))?
        .map_err(AppError::BcryptError)
}
