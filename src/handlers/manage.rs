// src/handlers/manage.rs
//
// Link de gerenciamento do cliente. O token bruto só aparece na URL;
// nunca entra em log.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::appointment::{Appointment, ManageAppointmentView},
    services::appointment_service::{AppointmentTarget, RescheduleCommand},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReschedulePayload {
    #[schema(example = "2025-03-12T14:00:00Z")]
    pub start_at: DateTime<Utc>,
    /// Troca de profissional (opcional).
    pub professional_id: Option<Uuid>,
}

impl From<ReschedulePayload> for RescheduleCommand {
    fn from(payload: ReschedulePayload) -> Self {
        RescheduleCommand {
            start_at: payload.start_at,
            professional_id: payload.professional_id,
        }
    }
}

// GET /api/public/manage/{token}
#[utoipa::path(
    get,
    path = "/api/public/manage/{token}",
    tag = "Manage Link",
    params(("token" = String, Path, description = "Token recebido no agendamento")),
    responses(
        (status = 200, description = "Agendamento do link", body = ManageAppointmentView),
        (status = 404, description = "Link inválido"),
        (status = 410, description = "Link expirado")
    )
)]
pub async fn view_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<Json<ManageAppointmentView>, ApiError> {
    let view = app_state
        .appointment_service
        .view_by_token(&app_state.db_pool, &token, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(view))
}

// POST /api/public/manage/{token}/reschedule
#[utoipa::path(
    post,
    path = "/api/public/manage/{token}/reschedule",
    tag = "Manage Link",
    params(("token" = String, Path, description = "Token recebido no agendamento")),
    request_body = ReschedulePayload,
    responses(
        (status = 200, description = "Agendamento remarcado", body = Appointment),
        (status = 409, description = "Horário indisponível ou agendamento encerrado"),
        (status = 422, description = "Fora da antecedência mínima")
    )
)]
pub async fn reschedule_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = app_state
        .appointment_service
        .reschedule(&app_state.db_pool, AppointmentTarget::Token(&token), payload.into(), Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}

// POST /api/public/manage/{token}/cancel
#[utoipa::path(
    post,
    path = "/api/public/manage/{token}/cancel",
    tag = "Manage Link",
    params(("token" = String, Path, description = "Token recebido no agendamento")),
    responses(
        (status = 200, description = "Agendamento cancelado; o link deixa de valer", body = Appointment),
        (status = 409, description = "Agendamento já encerrado"),
        (status = 422, description = "Fora da antecedência mínima")
    )
)]
pub async fn cancel_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = app_state
        .appointment_service
        .cancel(&app_state.db_pool, AppointmentTarget::Token(&token), Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}
