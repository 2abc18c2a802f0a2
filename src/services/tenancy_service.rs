// src/services/tenancy_service.rs

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DialogRepository, TenancyRepository, UserRepository},
    models::{
        auth::User,
        tenancy::{
            MemberRecord, Membership, Organization, OrganizationStats, OrganizationWithRole, Role,
        },
    },
    services::auth::AuthService,
};

// Alfabeto dos códigos de acesso: sem 0/O/1/I, que se confundem quando
// alguém dita o código por telefone ou o digita de um papel.
const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ACCESS_CODE_LENGTH: usize = 6;
const ACCESS_CODE_MAX_ATTEMPTS: usize = 10;

/// Serviço de tenancy: organizações, memberships e as regras que as
/// protegem (hierarquia de papéis, invariante do último dono).
#[derive(Clone)]
pub struct TenantService {
    tenancy_repo: TenancyRepository,
    user_repo: UserRepository,
    dialog_repo: DialogRepository,
    auth_service: AuthService,
    pool: PgPool,
}

impl TenantService {
    pub fn new(
        tenancy_repo: TenancyRepository,
        user_repo: UserRepository,
        dialog_repo: DialogRepository,
        auth_service: AuthService,
        pool: PgPool,
    ) -> Self {
        Self {
            tenancy_repo,
            user_repo,
            dialog_repo,
            auth_service,
            pool,
        }
    }

    // ============================================================
    // Organizações
    // ============================================================

    /// Cria a organização e a membership de dono do criador na MESMA
    /// transação: não existe organização sem dono, nem por um instante.
    pub async fn create_organization(
        &self,
        owner_user_id: Uuid,
        name: &str,
        slug: Option<&str>,
    ) -> Result<(Organization, Membership), AppError> {
        // O dono precisa existir e estar ativo antes de qualquer escrita
        self.user_repo
            .find_by_id(owner_user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::UserNotFound)?;

        let slug = match slug {
            Some(slug) => slug.to_owned(),
            None => unique_slug(name),
        };
        let access_code = self.draw_access_code().await?;

        let mut tx = self.pool.begin().await?;
        let organization = self
            .tenancy_repo
            .insert_organization(&mut *tx, name, &slug, &access_code)
            .await?;
        let membership = self
            .tenancy_repo
            .insert_membership(&mut *tx, owner_user_id, organization.id, Role::Owner)
            .await?;
        tx.commit().await?;

        tracing::info!(
            "✅ Organização '{}' criada (slug: {}, dono: {})",
            organization.name,
            organization.slug,
            owner_user_id
        );

        Ok((organization, membership))
    }

    /// Sorteia um código de acesso livre. A chance de colisão é mínima,
    /// mas o sorteio tem um teto de tentativas mesmo assim — um loop
    /// infinito contra o banco seria bem pior que um 500.
    async fn draw_access_code(&self) -> Result<String, AppError> {
        for _ in 0..ACCESS_CODE_MAX_ATTEMPTS {
            let code = generate_access_code();
            if !self.tenancy_repo.access_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AppError::InternalServerError(anyhow::anyhow!(
            "Não foi possível gerar um código de acesso único após {} tentativas",
            ACCESS_CODE_MAX_ATTEMPTS
        )))
    }

    pub async fn get_organization(&self, organization_id: Uuid) -> Result<Organization, AppError> {
        self.tenancy_repo
            .find_organization_by_id(organization_id)
            .await?
            .ok_or(AppError::OrganizationNotFound)
    }

    pub async fn get_organization_by_access_code(
        &self,
        access_code: &str,
    ) -> Result<Organization, AppError> {
        self.tenancy_repo
            .find_organization_by_access_code(&access_code.to_uppercase())
            .await?
            .ok_or(AppError::OrganizationNotFound)
    }

    pub async fn update_organization(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Organization, AppError> {
        self.tenancy_repo
            .update_organization_name(organization_id, name)
            .await?
            .ok_or(AppError::OrganizationNotFound)
    }

    /// Soft delete. As memberships ficam como estão: a organização inteira
    /// some das buscas, então nada mais resolve através dela.
    pub async fn delete_organization(&self, organization_id: Uuid) -> Result<(), AppError> {
        let deleted = self
            .tenancy_repo
            .deactivate_organization(organization_id)
            .await?;
        if !deleted {
            return Err(AppError::OrganizationNotFound);
        }
        tracing::info!("Organização {} desativada", organization_id);
        Ok(())
    }

    // ============================================================
    // Membros
    // ============================================================

    /// Vincula um usuário existente. Ex-membro desativado é REATIVADO com o
    /// papel pedido em vez de ganhar uma segunda linha.
    pub async fn add_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError> {
        self.get_organization(organization_id).await?;
        self.user_repo
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::UserNotFound)?;

        match self
            .tenancy_repo
            .find_membership(organization_id, user_id)
            .await?
        {
            Some(existing) if existing.is_active => Err(AppError::AlreadyExists(
                "Este usuário já é membro da organização.".into(),
            )),
            Some(existing) => {
                self.tenancy_repo
                    .reactivate_membership(&self.pool, existing.id, role)
                    .await
            }
            None => {
                self.tenancy_repo
                    .insert_membership(&self.pool, user_id, organization_id, role)
                    .await
            }
        }
    }

    /// Cria a conta E a vincula à organização. A conta é commitada primeiro
    /// de propósito: se o vínculo falhar, o usuário continua existindo e um
    /// admin pode vinculá-lo depois, em vez de obrigar um novo cadastro.
    pub async fn create_and_add_user(
        &self,
        organization_id: Uuid,
        username: &str,
        password: &str,
        full_name: &str,
        email: Option<&str>,
        role: Role,
    ) -> Result<(User, Membership), AppError> {
        self.get_organization(organization_id).await?;

        let user = self
            .auth_service
            .create_user(password, full_name, Some(username), email)
            .await?;

        let membership = self.add_member(organization_id, user.id, role).await?;
        Ok((user, membership))
    }

    /// Auto-registro: o código de acesso identifica a organização e o
    /// recém-criado entra sempre como 'member'.
    pub async fn join_by_access_code(
        &self,
        access_code: &str,
        username: &str,
        password: &str,
        full_name: &str,
    ) -> Result<(User, Organization, Membership), AppError> {
        let organization = self.get_organization_by_access_code(access_code).await?;

        let user = self
            .auth_service
            .create_user(password, full_name, Some(username), None)
            .await?;

        let membership = self
            .add_member(organization.id, user.id, Role::Member)
            .await?;

        Ok((user, organization, membership))
    }

    /// Remove (desativa) um membro. Se o alvo é dono, a contagem de donos
    /// ativos é travada com FOR UPDATE dentro da transação da escrita —
    /// duas remoções concorrentes não conseguem ambas passar pela checagem.
    pub async fn remove_member(
        &self,
        organization_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<(), AppError> {
        let membership = self
            .tenancy_repo
            .find_active_membership(organization_id, target_user_id)
            .await?
            .ok_or(AppError::MembershipNotFound)?;

        let mut tx = self.pool.begin().await?;
        if membership.role == Role::Owner {
            let owners = self
                .tenancy_repo
                .count_active_owners_for_update(&mut *tx, organization_id)
                .await?;
            if owners <= 1 {
                return Err(AppError::LastOwner);
            }
        }
        self.tenancy_repo
            .deactivate_membership(&mut *tx, membership.id)
            .await?;
        tx.commit().await?;

        // A sessão revogada força o ex-membro a cair no próximo request
        let revoked = self
            .auth_service
            .revoke_all_sessions(target_user_id, None)
            .await?;
        tracing::info!(
            "Membro {} removido da organização {} ({} sessões revogadas)",
            target_user_id,
            organization_id,
            revoked
        );

        Ok(())
    }

    /// Troca o papel de um membro. Rebaixar o último dono é recusado com a
    /// mesma trava FOR UPDATE da remoção.
    pub async fn change_member_role(
        &self,
        organization_id: Uuid,
        target_user_id: Uuid,
        new_role: Role,
    ) -> Result<Membership, AppError> {
        let membership = self
            .tenancy_repo
            .find_active_membership(organization_id, target_user_id)
            .await?
            .ok_or(AppError::MembershipNotFound)?;

        if membership.role == new_role {
            return Ok(membership);
        }

        let mut tx = self.pool.begin().await?;
        if membership.role == Role::Owner && new_role < Role::Owner {
            let owners = self
                .tenancy_repo
                .count_active_owners_for_update(&mut *tx, organization_id)
                .await?;
            if owners <= 1 {
                return Err(AppError::LastOwner);
            }
        }
        let updated = self
            .tenancy_repo
            .update_membership_role(&mut *tx, membership.id, new_role)
            .await?;
        tx.commit().await?;

        Ok(updated)
    }

    // ============================================================
    // Consultas de autorização e leitura
    // ============================================================

    /// Membership ativa do usuário na organização, exigindo um papel mínimo.
    /// Não-membro -> 403; membro abaixo do mínimo -> 403 com outro motivo.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        minimum: Role,
    ) -> Result<Membership, AppError> {
        let membership = self
            .tenancy_repo
            .find_active_membership(organization_id, user_id)
            .await?
            .ok_or(AppError::NotAMember)?;

        if membership.role < minimum {
            return Err(AppError::InsufficientRole(minimum.as_str()));
        }
        Ok(membership)
    }

    pub async fn is_member(&self, user_id: Uuid, organization_id: Uuid) -> Result<bool, AppError> {
        self.tenancy_repo.is_member(user_id, organization_id).await
    }

    pub async fn list_members(
        &self,
        organization_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MemberRecord>, AppError> {
        self.get_organization(organization_id).await?;
        self.tenancy_repo
            .list_members(organization_id, active_only)
            .await
    }

    pub async fn list_user_organizations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationWithRole>, AppError> {
        self.tenancy_repo.list_user_organizations(user_id).await
    }

    // Ids das organizações ativas do usuário (alimenta o filtro de visibilidade)
    pub async fn list_user_organization_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.tenancy_repo.list_user_organization_ids(user_id).await
    }

    pub async fn get_organization_stats(
        &self,
        organization_id: Uuid,
    ) -> Result<OrganizationStats, AppError> {
        self.get_organization(organization_id).await?;

        let owners = self
            .tenancy_repo
            .count_members_by_role(organization_id, Role::Owner)
            .await?;
        let admins = self
            .tenancy_repo
            .count_members_by_role(organization_id, Role::Admin)
            .await?;
        let members = self
            .tenancy_repo
            .count_members_by_role(organization_id, Role::Member)
            .await?;
        let viewers = self
            .tenancy_repo
            .count_members_by_role(organization_id, Role::Viewer)
            .await?;
        let dialogs = self.dialog_repo.count_for_organization(organization_id).await?;

        Ok(OrganizationStats {
            total_members: owners + admins + members + viewers,
            owners,
            admins,
            members,
            viewers,
            dialogs,
        })
    }
}

// ---
// Helpers puros
// ---

/// Slug determinístico a partir do nome + sufixo aleatório de 6 hex.
/// O sufixo evita colisão entre organizações de mesmo nome.
fn unique_slug(name: &str) -> String {
    let base = slugify(name);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &suffix[..6])
}

fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_hyphen = true; // suprime hífen inicial
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "org".to_string()
    } else {
        trimmed.to_string()
    }
}

fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..ACCESS_CODE_ALPHABET.len());
            ACCESS_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_e_minusculo_com_hifens() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Vendas & Marketing!  "), "vendas-marketing");
        assert_eq!(slugify("ABC123"), "abc123");
    }

    #[test]
    fn slug_de_nome_sem_caracteres_uteis_tem_fallback() {
        assert_eq!(slugify("!!!"), "org");
    }

    #[test]
    fn slug_unico_carrega_sufixo_de_seis_hex() {
        let slug = unique_slug("Acme Corp");
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "acme-corp");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn codigo_de_acesso_usa_so_o_alfabeto_sem_ambiguos() {
        for _ in 0..100 {
            let code = generate_access_code();
            assert_eq!(code.len(), ACCESS_CODE_LENGTH);
            for c in code.bytes() {
                assert!(ACCESS_CODE_ALPHABET.contains(&c), "caractere fora do alfabeto: {}", c as char);
                assert!(![b'0', b'O', b'1', b'I'].contains(&c));
            }
        }
    }

    #[test]
    fn dois_codigos_raramente_coincidem() {
        let a = generate_access_code();
        let b = generate_access_code();
        // Probabilístico, mas com 32^6 combinações uma colisão aqui
        // indicaria um gerador quebrado.
        assert_ne!(a, b);
    }
}
