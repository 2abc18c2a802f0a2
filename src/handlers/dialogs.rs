// src/handlers/dialogs.rs

use axum::{extract::State, Json};

use crate::{
    common::error::AppError, config::AppState, middleware::auth::Authenticated,
    models::dialog::Dialog,
};

// GET /api/dialogs
//
// O consumidor do contexto de autorização: a listagem devolve diálogos sem
// dono (legado), os do próprio usuário e os das organizações em que ele é
// membro ativo — independente da organização selecionada na sessão.
#[utoipa::path(
    get,
    path = "/api/dialogs",
    tag = "Dialogs",
    responses(
        (status = 200, description = "Diálogos visíveis para o usuário", body = [Dialog])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_dialogs(
    State(app_state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<Vec<Dialog>>, AppError> {
    let organization_ids = app_state
        .tenant_service
        .list_user_organization_ids(ctx.user.id)
        .await?;

    let dialogs = app_state
        .dialog_repo
        .list_visible(ctx.user.id, &organization_ids)
        .await?;
    Ok(Json(dialogs))
}
