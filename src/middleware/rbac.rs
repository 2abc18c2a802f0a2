// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::AppError,
    models::{auth::AuthContext, tenancy::Role},
};

/// Papel mínimo que um gate exige. Implementado por tipos-marcador vazios,
/// um por nível da hierarquia.
pub trait RoleGate {
    fn minimum() -> Role;
}

pub struct MinOwner;
pub struct MinAdmin;
pub struct MinMember;
pub struct MinViewer;

impl RoleGate for MinOwner {
    fn minimum() -> Role {
        Role::Owner
    }
}
impl RoleGate for MinAdmin {
    fn minimum() -> Role {
        Role::Admin
    }
}
impl RoleGate for MinMember {
    fn minimum() -> Role {
        Role::Member
    }
}
impl RoleGate for MinViewer {
    fn minimum() -> Role {
        Role::Viewer
    }
}

/// Extrator de "role gate": exige sessão com organização selecionada E papel
/// no mínimo `G::minimum()`. O handler recebe o contexto já checado:
///
/// `async fn handler(RequireRole(ctx, _): RequireRole<MinAdmin>) -> ...`
///
/// Sessão sem organização -> 400; papel insuficiente -> 403.
pub struct RequireRole<G: RoleGate>(pub AuthContext, pub PhantomData<G>);

impl<S, G> FromRequestParts<S> for RequireRole<G>
where
    S: Send + Sync,
    G: RoleGate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::InvalidToken)?;

        ctx.require_role(G::minimum())?;

        Ok(RequireRole(ctx, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{
        auth::User,
        tenancy::{Membership, Organization},
    };

    fn context_with_role(role: Option<Role>) -> AuthContext {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: Some("maria".into()),
            email: None,
            password_hash: "$2b$12$hash".into(),
            full_name: "Maria Silva".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let (organization, membership) = match role {
            Some(role) => {
                let org_id = Uuid::new_v4();
                let organization = Organization {
                    id: org_id,
                    name: "Acme".into(),
                    slug: "acme-abc123".into(),
                    access_code: "ABC234".into(),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                let membership = Membership {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    organization_id: org_id,
                    department_id: None,
                    role,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                (Some(organization), Some(membership))
            }
            None => (None, None),
        };

        AuthContext {
            user,
            session_id: Uuid::new_v4(),
            access_jti: Uuid::new_v4(),
            organization,
            membership,
        }
    }

    async fn run_gate<G: RoleGate>(ctx: Option<AuthContext>) -> Result<AuthContext, AppError> {
        let mut request = Request::new(());
        if let Some(ctx) = ctx {
            request.extensions_mut().insert(ctx);
        }
        let (mut parts, _) = request.into_parts();
        RequireRole::<G>::from_request_parts(&mut parts, &())
            .await
            .map(|RequireRole(ctx, _)| ctx)
    }

    #[tokio::test]
    async fn gate_exige_contexto_autenticado() {
        let result = run_gate::<MinViewer>(None).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn gate_rejeita_sessao_sem_organizacao() {
        let result = run_gate::<MinViewer>(Some(context_with_role(None))).await;
        assert!(matches!(result, Err(AppError::OrganizationRequired)));
    }

    #[tokio::test]
    async fn gate_rejeita_papel_abaixo_do_minimo() {
        let result = run_gate::<MinAdmin>(Some(context_with_role(Some(Role::Member)))).await;
        assert!(matches!(result, Err(AppError::InsufficientRole(_))));
    }

    #[tokio::test]
    async fn papel_superior_passa_pelo_gate_inferior() {
        let ctx = run_gate::<MinAdmin>(Some(context_with_role(Some(Role::Owner))))
            .await
            .unwrap();
        assert_eq!(ctx.role(), Some(Role::Owner));
    }
}
