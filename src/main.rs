//src/main.rs

use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

#[cfg(test)]
mod flow_tests;

use crate::config::AppState;
use crate::middleware::auth::auth_middleware;

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Varredura periódica do ledger: sessões expiradas são apagadas de vez.
    // A corretude não depende dela (expiração e revogação são checadas por
    // requisição); é só higiene da tabela.
    let sweeper_state = app_state.clone();
    let sweep_interval = Duration::from_secs(app_state.settings.session_sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // o primeiro tick dispara imediatamente
        loop {
            ticker.tick().await;
            match sweeper_state.auth_service.sweep_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("🧹 {} sessões expiradas removidas", n),
                Err(e) => tracing::warn!("Falha na varredura de sessões: {}", e),
            }
        }
    });

    // Rotas de autenticação públicas (logout incluso: ele é idempotente e
    // precisa aceitar tokens de sessões já revogadas)
    let auth_public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/login-with-username", post(handlers::auth::login_with_username))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout));

    // Rotas de conta protegidas pelo middleware
    let auth_protected_routes = Router::new()
        .route("/select-organization", post(handlers::auth::select_organization))
        .route("/me", get(handlers::auth::get_me))
        .route("/organization", get(handlers::auth::get_current_organization))
        .route("/organizations", get(handlers::auth::get_my_organizations))
        .route("/profile", patch(handlers::auth::update_profile))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    // Rotas públicas de organização (fluxo de join, antes de existir conta)
    let organization_public_routes = Router::new()
        .route("/by-code/{code}", get(handlers::organizations::get_organization_by_code))
        .route("/join", post(handlers::organizations::join_organization));

    let organization_routes = Router::new()
        .route("/", post(handlers::organizations::create_organization))
        .route("/{id}"
               ,get(handlers::organizations::get_organization)
               .put(handlers::organizations::update_organization)
               .delete(handlers::organizations::delete_organization)
        )
        .route("/{id}/members"
               ,get(handlers::organizations::list_members)
               .post(handlers::organizations::create_member)
        )
        .route("/{id}/members/{user_id}", delete(handlers::organizations::remove_member))
        .route("/{id}/members/{user_id}/role", patch(handlers::organizations::change_member_role))
        .route("/{id}/stats", get(handlers::organizations::get_organization_stats))
        .route("/{id}/departments"
               ,get(handlers::departments::list_departments)
               .post(handlers::departments::create_department)
        )
        .route("/{id}/departments/{dept_id}"
               ,put(handlers::departments::update_department)
               .delete(handlers::departments::delete_department)
        )
        .route("/{id}/departments/{dept_id}/members", post(handlers::departments::assign_member))
        .route("/{id}/departments/{dept_id}/members/{user_id}", delete(handlers::departments::unassign_member))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    let dialog_routes = Router::new()
        .route("/", get(handlers::dialogs::list_dialogs))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_public_routes.merge(auth_protected_routes))
        .nest("/api/organizations", organization_public_routes.merge(organization_routes))
        .nest("/api/dialogs", dialog_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state.clone());

    // Inicia o servidor
    let listener = TcpListener::bind(&app_state.settings.bind_addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
