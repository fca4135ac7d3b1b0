// src/handlers/appointments.rs
//
// Painel do estabelecimento: ações da equipe sobre um agendamento.
// Todas passam pelo tenant_guard, então o estabelecimento vem do cabeçalho.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::manage::ReschedulePayload,
    middleware::{auth::MemberContext, i18n::Locale, tenancy::TenantContext},
    models::appointment::{Appointment, AppointmentEvent, StatusAction},
    services::appointment_service::AppointmentTarget,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManageTokenResponse {
    pub manage_token: String,
    pub expires_at: DateTime<Utc>,
}

// POST /api/appointments/{id}/reschedule
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/reschedule",
    tag = "Appointments",
    request_body = ReschedulePayload,
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Agendamento remarcado", body = Appointment),
        (status = 409, description = "Horário indisponível ou agendamento encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reschedule(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    member: MemberContext,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<Json<Appointment>, ApiError> {
    let target = AppointmentTarget::Member {
        establishment_id: tenant.0,
        appointment_id,
        actor: member.actor(),
    };

    let appointment = app_state
        .appointment_service
        .reschedule(&app_state.db_pool, target, payload.into(), Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}

// POST /api/appointments/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/cancel",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Agendamento cancelado", body = Appointment),
        (status = 409, description = "Agendamento já encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    member: MemberContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let target = AppointmentTarget::Member {
        establishment_id: tenant.0,
        appointment_id,
        actor: member.actor(),
    };

    let appointment = app_state
        .appointment_service
        .cancel(&app_state.db_pool, target, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}

async fn change_status(
    app_state: &AppState,
    locale: &Locale,
    tenant: TenantContext,
    member: MemberContext,
    appointment_id: Uuid,
    action: StatusAction,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = app_state
        .appointment_service
        .change_status(&app_state.db_pool, tenant.0, appointment_id, action, member.actor(), Utc::now())
        .await
        .map_err(|e| e.to_api_error(locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}

// POST /api/appointments/{id}/confirm
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/confirm",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Agendamento confirmado", body = Appointment),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    member: MemberContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    change_status(&app_state, &locale, tenant, member, appointment_id, StatusAction::Confirm).await
}

// POST /api/appointments/{id}/complete
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/complete",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Atendimento concluído", body = Appointment),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn complete(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    member: MemberContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    change_status(&app_state, &locale, tenant, member, appointment_id, StatusAction::Complete).await
}

// POST /api/appointments/{id}/no-show
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/no-show",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Falta registrada", body = Appointment),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn no_show(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    member: MemberContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    change_status(&app_state, &locale, tenant, member, appointment_id, StatusAction::NoShow).await
}

// POST /api/appointments/{id}/manage-token
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/manage-token",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Novo link do cliente; o anterior deixa de valer", body = ManageTokenResponse),
        (status = 404, description = "Agendamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reissue_manage_token(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ManageTokenResponse>, ApiError> {
    let token = app_state
        .appointment_service
        .reissue_manage_token(&app_state.db_pool, tenant.0, appointment_id, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(ManageTokenResponse {
        manage_token: token.raw,
        expires_at: token.expires_at,
    }))
}

// GET /api/appointments/{id}/events
#[utoipa::path(
    get,
    path = "/api/appointments/{id}/events",
    tag = "Appointments",
    params(
        ("id" = Uuid, Path, description = "ID do agendamento"),
        ("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")
    ),
    responses(
        (status = 200, description = "Histórico do agendamento, do mais antigo ao mais recente", body = Vec<AppointmentEvent>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_events(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentEvent>>, ApiError> {
    let events = app_state
        .appointment_service
        .list_events(&app_state.db_pool, tenant.0, appointment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(events))
}
