// src/config.rs

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

use crate::{
    db::{
        DepartmentRepository, DialogRepository, SessionRepository, TenancyRepository,
        UserRepository,
    },
    services::{
        auth::AuthService, department_service::DepartmentService, tenancy_service::TenantService,
        token::TokenCodec,
    },
};

// Configuração imutável do processo, carregada UMA vez no arranque e
// injetada nos componentes por construção. Nada aqui é estado global mutável.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub password_min_length: usize,
    pub password_max_length: usize,
    pub session_sweep_interval_secs: u64,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET deve ser definido"))?;

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_expire_minutes: env_or("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", 60)?,
            refresh_token_expire_days: env_or("JWT_REFRESH_TOKEN_EXPIRE_DAYS", 30)?,
            password_min_length: env_or("PASSWORD_MIN_LENGTH", 8)?,
            password_max_length: env_or("PASSWORD_MAX_LENGTH", 128)?,
            session_sweep_interval_secs: env_or("SESSION_SWEEP_INTERVAL_SECS", 3600)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

// Lê uma variável numérica do ambiente, com default quando ausente.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} contém um valor inválido: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Settings,
    pub token_codec: TokenCodec,
    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub department_service: DepartmentService,
    pub dialog_repo: DialogRepository,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let settings = Settings::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let session_repo = SessionRepository::new(db_pool.clone());
        let tenancy_repo = TenancyRepository::new(db_pool.clone());
        let department_repo = DepartmentRepository::new(db_pool.clone());
        let dialog_repo = DialogRepository::new(db_pool.clone());

        let token_codec = TokenCodec::new(&settings);

        let auth_service = AuthService::new(
            user_repo.clone(),
            session_repo.clone(),
            tenancy_repo.clone(),
            token_codec.clone(),
            &settings,
            db_pool.clone(),
        );

        let tenant_service = TenantService::new(
            tenancy_repo.clone(),
            user_repo.clone(),
            dialog_repo.clone(),
            auth_service.clone(),
            db_pool.clone(),
        );

        let department_service =
            DepartmentService::new(department_repo, tenancy_repo, db_pool.clone());

        Ok(Self {
            db_pool,
            settings,
            token_codec,
            auth_service,
            tenant_service,
            department_service,
            dialog_repo,
        })
    }
}
