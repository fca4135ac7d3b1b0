// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        tenancy::{establishment_id_from_headers, TenantContext},
    },
    models::{
        appointment::Actor,
        auth::{MemberRole, User},
    },
};

// Usuário autenticado, colocado nos "extensions" pelos guards
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Papel do usuário no estabelecimento do cabeçalho.
#[derive(Debug, Clone, Copy)]
pub struct MemberContext {
    pub user_id: Uuid,
    pub role: MemberRole,
}

impl MemberContext {
    /// Como este membro aparece na trilha de auditoria.
    pub fn actor(&self) -> Actor {
        Actor::member(self.role.actor_type(), self.user_id)
    }
}

async fn authenticate(
    app_state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<User, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidToken)?;
    app_state.auth_service.validate_token(bearer.token()).await
}

// Exige um JWT válido
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&app_state, bearer)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

// Exige JWT válido + cabeçalho x-establishment-id + vínculo com o estabelecimento
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let user = authenticate(&app_state, bearer).await.map_err(to_api)?;
    let establishment_id = establishment_id_from_headers(request.headers()).map_err(to_api)?;
    let role = app_state
        .auth_service
        .membership(establishment_id, user.id)
        .await
        .map_err(to_api)?;

    let member = MemberContext { user_id: user.id, role };
    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(TenantContext(establishment_id));
    request.extensions_mut().insert(member);

    Ok(next.run(request).await)
}

fn missing_context(what: &str) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error: format!("{} ausente: rota sem o guard correspondente", what),
        code: None,
        details: None,
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| missing_context("Usuário autenticado"))
    }
}

impl<S> FromRequestParts<S> for MemberContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<MemberContext>()
            .copied()
            .ok_or_else(|| missing_context("Contexto de membro"))
    }
}
