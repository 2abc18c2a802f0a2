// src/flow_tests.rs
//
// Testes de fluxo contra um Postgres real. Ignorados por padrão:
//
//   DATABASE_URL=postgres://... cargo test -- --ignored
//
// Cada teste cria os próprios dados com identificadores únicos, então eles
// podem rodar em qualquer ordem e mais de uma vez contra o mesmo banco.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Settings,
    db::{
        DepartmentRepository, DialogRepository, SessionRepository, TenancyRepository,
        UserRepository,
    },
    models::tenancy::Role,
    services::{
        auth::AuthService, department_service::DepartmentService, tenancy_service::TenantService,
        token::TokenCodec,
    },
};

struct TestHarness {
    auth: AuthService,
    tenants: TenantService,
    departments: DepartmentService,
    codec: TokenCodec,
    #[allow(dead_code)]
    pool: PgPool,
}

async fn harness() -> TestHarness {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL é obrigatória para os testes de fluxo");

    let settings = Settings {
        database_url: database_url.clone(),
        jwt_secret: "segredo-dos-testes-de-fluxo".into(),
        access_token_expire_minutes: 60,
        refresh_token_expire_days: 30,
        password_min_length: 8,
        password_max_length: 128,
        session_sweep_interval_secs: 3600,
        bind_addr: "127.0.0.1:0".into(),
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("falha ao conectar no Postgres de teste");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("falha ao rodar as migrações");

    let user_repo = UserRepository::new(pool.clone());
    let session_repo = SessionRepository::new(pool.clone());
    let tenancy_repo = TenancyRepository::new(pool.clone());
    let department_repo = DepartmentRepository::new(pool.clone());
    let dialog_repo = DialogRepository::new(pool.clone());

    let codec = TokenCodec::new(&settings);
    let auth = AuthService::new(
        user_repo.clone(),
        session_repo,
        tenancy_repo.clone(),
        codec.clone(),
        &settings,
        pool.clone(),
    );
    let tenants = TenantService::new(
        tenancy_repo.clone(),
        user_repo,
        dialog_repo,
        auth.clone(),
        pool.clone(),
    );
    let departments = DepartmentService::new(department_repo, tenancy_repo, pool.clone());

    TestHarness { auth, tenants, departments, codec, pool }
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@teste.local", prefix, Uuid::new_v4().simple())
}

fn unique_username(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

async fn new_user(h: &TestHarness, prefix: &str) -> crate::models::auth::User {
    h.auth
        .create_user(
            "senha-muito-segura",
            "Usuário de Teste",
            None,
            Some(&unique_email(prefix)),
        )
        .await
        .expect("falha ao criar usuário de teste")
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn logout_derruba_o_token_mesmo_com_assinatura_valida() {
    let h = harness().await;
    let user = new_user(&h, "logout").await;

    let tokens = h.auth.create_session(user.id, None).await.unwrap();

    // Antes do logout o token resolve normalmente
    let ctx = h.auth.resolve_access(&tokens.access_token).await.unwrap();
    assert_eq!(ctx.user.id, user.id);

    // Logout revoga a sessão; o MESMO token (assinatura e validade intactas)
    // passa a cair no ledger
    h.auth.logout(ctx.access_jti).await.unwrap();
    match h.auth.resolve_access(&tokens.access_token).await {
        Err(AppError::RevokedSession) => {}
        other => panic!("esperava RevokedSession, veio {:?}", other.map(|c| c.user.id)),
    }

    // Logout repetido continua sendo sucesso
    h.auth.logout(ctx.access_jti).await.unwrap();
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn refresh_token_e_de_uso_unico() {
    let h = harness().await;
    let user = new_user(&h, "refresh").await;

    let tokens = h.auth.create_session(user.id, None).await.unwrap();
    let refresh_claims = h.codec.decode(&tokens.refresh_token).unwrap();

    // Primeiro refresh: rotaciona e devolve um par novo
    let (rotated, _) = h.auth.refresh(refresh_claims.jti).await.unwrap();
    assert_ne!(rotated.access_token, tokens.access_token);

    // O jti antigo morreu junto com a sessão antiga
    match h.auth.refresh(refresh_claims.jti).await {
        Err(AppError::InvalidRefreshToken) => {}
        other => panic!("esperava InvalidRefreshToken, veio {:?}", other.map(|_| ())),
    }

    // E o access token antigo também caiu
    match h.auth.resolve_access(&tokens.access_token).await {
        Err(AppError::RevokedSession) => {}
        other => panic!("esperava RevokedSession, veio {:?}", other.map(|c| c.user.id)),
    }
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn ultimo_dono_nao_sai_nem_e_rebaixado() {
    let h = harness().await;
    let owner = new_user(&h, "dono").await;
    let (org, _) = h
        .tenants
        .create_organization(owner.id, "Org do Último Dono", None)
        .await
        .unwrap();

    // Sozinho, o dono não sai nem é rebaixado
    match h.tenants.remove_member(org.id, owner.id).await {
        Err(AppError::LastOwner) => {}
        other => panic!("esperava LastOwner, veio {:?}", other.map(|_| ())),
    }
    match h
        .tenants
        .change_member_role(org.id, owner.id, Role::Admin)
        .await
    {
        Err(AppError::LastOwner) => {}
        other => panic!("esperava LastOwner, veio {:?}", other.map(|_| ())),
    }

    // Com um segundo dono, o rebaixamento passa
    let second = new_user(&h, "dono2").await;
    h.tenants
        .add_member(org.id, second.id, Role::Owner)
        .await
        .unwrap();
    let demoted = h
        .tenants
        .change_member_role(org.id, owner.id, Role::Admin)
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::Admin);
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn troca_de_organizacao_rejeitada_preserva_a_sessao() {
    let h = harness().await;
    let user = new_user(&h, "troca").await;
    let outsider = new_user(&h, "dono-alheio").await;
    let (org_alheia, _) = h
        .tenants
        .create_organization(outsider.id, "Organização Alheia", None)
        .await
        .unwrap();

    let tokens = h.auth.create_session(user.id, None).await.unwrap();
    let ctx = h.auth.resolve_access(&tokens.access_token).await.unwrap();

    // Não-membro: a troca é recusada ANTES de revogar qualquer coisa
    match h
        .auth
        .switch_organization(user.id, org_alheia.id, ctx.access_jti)
        .await
    {
        Err(AppError::NotAMember) => {}
        other => panic!("esperava NotAMember, veio {:?}", other.map(|_| ())),
    }

    // A sessão corrente continua válida
    let ctx = h.auth.resolve_access(&tokens.access_token).await.unwrap();
    assert_eq!(ctx.user.id, user.id);
    assert!(ctx.organization.is_none());
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn troca_de_organizacao_rotaciona_e_carrega_o_claim() {
    let h = harness().await;
    let user = new_user(&h, "selecao").await;
    let (org, _) = h
        .tenants
        .create_organization(user.id, "Org da Seleção", None)
        .await
        .unwrap();

    let tokens = h.auth.create_session(user.id, None).await.unwrap();
    let ctx = h.auth.resolve_access(&tokens.access_token).await.unwrap();

    let switched = h
        .auth
        .switch_organization(user.id, org.id, ctx.access_jti)
        .await
        .unwrap();

    // A sessão antiga morreu; a nova resolve com a organização e o papel
    match h.auth.resolve_access(&tokens.access_token).await {
        Err(AppError::RevokedSession) => {}
        other => panic!("esperava RevokedSession, veio {:?}", other.map(|c| c.user.id)),
    }
    let ctx = h.auth.resolve_access(&switched.access_token).await.unwrap();
    assert_eq!(ctx.organization.as_ref().map(|o| o.id), Some(org.id));
    assert_eq!(ctx.role(), Some(Role::Owner));
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn join_por_codigo_entra_como_member_e_respeita_o_gate() {
    let h = harness().await;
    let owner = new_user(&h, "dono-join").await;
    let (org, _) = h
        .tenants
        .create_organization(owner.id, "Org do Join", None)
        .await
        .unwrap();

    // O código gerado tem o formato esperado
    assert_eq!(org.access_code.len(), 6);
    assert!(org
        .access_code
        .bytes()
        .all(|c| b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789".contains(&c)));

    let username = unique_username("recruta");
    let (user, joined_org, membership) = h
        .tenants
        .join_by_access_code(&org.access_code, &username, "senha-do-recruta", "Recruta")
        .await
        .unwrap();
    assert_eq!(joined_org.id, org.id);
    assert_eq!(membership.role, Role::Member);

    // Member passa pelo gate de member, mas não pelo de admin
    h.tenants
        .check_permission(user.id, org.id, Role::Member)
        .await
        .unwrap();
    match h
        .tenants
        .check_permission(user.id, org.id, Role::Admin)
        .await
    {
        Err(AppError::InsufficientRole(_)) => {}
        other => panic!("esperava InsufficientRole, veio {:?}", other.map(|_| ())),
    }

    // Quem nunca entrou não é membro
    let stranger = new_user(&h, "estranho").await;
    match h
        .tenants
        .check_permission(stranger.id, org.id, Role::Viewer)
        .await
    {
        Err(AppError::NotAMember) => {}
        other => panic!("esperava NotAMember, veio {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn remover_membro_revoga_as_sessoes_dele() {
    let h = harness().await;
    let owner = new_user(&h, "dono-remocao").await;
    let member = new_user(&h, "removido").await;
    let (org, _) = h
        .tenants
        .create_organization(owner.id, "Org da Remoção", None)
        .await
        .unwrap();
    h.tenants
        .add_member(org.id, member.id, Role::Member)
        .await
        .unwrap();

    let tokens = h.auth.create_session(member.id, Some(org.id)).await.unwrap();
    h.auth.resolve_access(&tokens.access_token).await.unwrap();

    h.tenants.remove_member(org.id, member.id).await.unwrap();

    // A sessão do removido caiu junto
    match h.auth.resolve_access(&tokens.access_token).await {
        Err(AppError::RevokedSession) => {}
        other => panic!("esperava RevokedSession, veio {:?}", other.map(|c| c.user.id)),
    }
}

#[tokio::test]
#[ignore = "precisa de Postgres (DATABASE_URL)"]
async fn apagar_departamento_desvincula_os_membros() {
    let h = harness().await;
    let owner = new_user(&h, "dono-depto").await;
    let member = new_user(&h, "membro-depto").await;
    let (org, _) = h
        .tenants
        .create_organization(owner.id, "Org dos Departamentos", None)
        .await
        .unwrap();
    h.tenants
        .add_member(org.id, member.id, Role::Member)
        .await
        .unwrap();

    let dept = h
        .departments
        .create_department(org.id, "Atendimento", Some(owner.id))
        .await
        .unwrap();
    let membership = h
        .departments
        .assign_member(org.id, member.id, Some(dept.id))
        .await
        .unwrap();
    assert_eq!(membership.department_id, Some(dept.id));

    h.departments
        .delete_department(org.id, dept.id)
        .await
        .unwrap();

    // O membro continua na organização, só que sem departamento
    let membership = h
        .tenants
        .check_permission(member.id, org.id, Role::Member)
        .await
        .unwrap();
    assert_eq!(membership.department_id, None);
}
