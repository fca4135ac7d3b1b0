// src/handlers/portal.rs
//
// Portal do profissional: agenda só para leitura, com sessão própria
// (não usa o JWT do painel).

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::{
        appointment::AppointmentView,
        portal::{PortalLoginPayload, PortalSession},
    },
};

// POST /api/portal/login
#[utoipa::path(
    post,
    path = "/api/portal/login",
    tag = "Professional Portal",
    request_body = PortalLoginPayload,
    responses(
        (status = 200, description = "Sessão do portal aberta", body = PortalSession),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<PortalLoginPayload>,
) -> Result<Json<PortalSession>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .portal_service
        .login(
            &app_state.db_pool,
            &payload.establishment_slug,
            &payload.professional_slug,
            &payload.password,
            Utc::now(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AgendaParams {
    #[param(example = "2025-03-10T00:00:00Z")]
    pub from: DateTime<Utc>,
    #[param(example = "2025-03-17T00:00:00Z")]
    pub to: DateTime<Utc>,
}

// GET /api/portal/appointments
#[utoipa::path(
    get,
    path = "/api/portal/appointments",
    tag = "Professional Portal",
    params(AgendaParams),
    responses(
        (status = 200, description = "Agenda do profissional no intervalo", body = Vec<AppointmentView>),
        (status = 401, description = "Sessão inválida ou expirada")
    ),
    security(("portal_session" = []))
)]
pub async fn list_appointments(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(params): Query<AgendaParams>,
) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or(AppError::InvalidToken)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let appointments = app_state
        .portal_service
        .list_appointments(&app_state.db_pool, bearer.token(), params.from, params.to, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointments))
}
