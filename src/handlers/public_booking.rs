// src/handlers/public_booking.rs
//
// Página pública de agendamento: sem login, o estabelecimento vem do slug.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::{
        appointment::{Appointment, CustomerInput},
        availability::Availability,
    },
    services::{
        appointment_service::CreateAppointmentCommand,
        availability_service::AvailabilityQuery,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AvailabilityParams {
    pub service_id: Uuid,
    /// Ausente = qualquer profissional que ofereça o serviço.
    pub professional_id: Option<Uuid>,
    #[param(value_type = String, example = "2025-03-10")]
    pub from: NaiveDate,
    /// Ausente = só o dia `from`.
    #[param(value_type = Option<String>, example = "2025-03-16")]
    pub to: Option<NaiveDate>,
}

// GET /api/public/{slug}/availability
#[utoipa::path(
    get,
    path = "/api/public/{slug}/availability",
    tag = "Public Booking",
    params(
        ("slug" = String, Path, description = "Slug do estabelecimento"),
        AvailabilityParams
    ),
    responses(
        (status = 200, description = "Horários livres por dia, ou o motivo de não aceitar agendamentos", body = Availability),
        (status = 404, description = "Estabelecimento, serviço ou profissional não encontrado")
    )
)]
pub async fn get_availability(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(slug): Path<String>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Availability>, ApiError> {
    let query = AvailabilityQuery {
        slug,
        service_id: params.service_id,
        professional_id: params.professional_id,
        from: params.from,
        to: params.to,
    };

    let availability = app_state
        .availability_service
        .get_availability(&app_state.db_pool, &query, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(availability))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentPayload {
    pub service_id: Uuid,
    pub professional_id: Uuid,
    #[schema(example = "2025-03-10T12:30:00Z")]
    pub start_at: DateTime<Utc>,
    /// Opcional: quando enviado precisa bater com a duração do serviço.
    pub end_at: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub customer: CustomerInput,
    #[serde(default)]
    pub policy_accepted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentResponse {
    pub appointment_id: Uuid,
    pub appointment: Appointment,
    /// Entregue uma única vez; só o hash fica no banco.
    pub manage_token: Option<String>,
    pub manage_token_expires_at: Option<DateTime<Utc>>,
}

// POST /api/public/{slug}/appointments
#[utoipa::path(
    post,
    path = "/api/public/{slug}/appointments",
    tag = "Public Booking",
    params(("slug" = String, Path, description = "Slug do estabelecimento")),
    request_body = CreateAppointmentPayload,
    responses(
        (status = 201, description = "Agendamento criado", body = CreateAppointmentResponse),
        (status = 400, description = "Dados do cliente inválidos"),
        (status = 402, description = "Limite mensal do plano atingido"),
        (status = 409, description = "Horário não está mais disponível"),
        (status = 422, description = "Regra do estabelecimento violada")
    )
)]
pub async fn create_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(slug): Path<String>,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let cmd = CreateAppointmentCommand {
        slug,
        service_id: payload.service_id,
        professional_id: payload.professional_id,
        start_at: payload.start_at,
        end_at: payload.end_at,
        customer: payload.customer,
        policy_accepted: payload.policy_accepted,
    };

    let created = app_state
        .appointment_service
        .create(&app_state.db_pool, cmd, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let (manage_token, manage_token_expires_at) = match created.manage_token {
        Some(token) => (Some(token.raw), Some(token.expires_at)),
        None => (None, None),
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateAppointmentResponse {
            appointment_id: created.appointment.id,
            appointment: created.appointment,
            manage_token,
            manage_token_expires_at,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::i18n::I18nStore;

    #[test]
    fn customer_errors_are_reported_with_their_nested_path() {
        let body = serde_json::json!({
            "serviceId": Uuid::new_v4(),
            "professionalId": Uuid::new_v4(),
            "startAt": "2025-03-10T12:30:00Z",
            "customer": { "name": "Ana", "phone": "11987654321" }
        });
        let payload: CreateAppointmentPayload = serde_json::from_value(body).unwrap();
        assert!(!payload.policy_accepted);

        let errors = payload.validate().unwrap_err();
        let api = AppError::ValidationError(errors)
            .to_api_error(&Locale("en".into()), &I18nStore::load().unwrap());

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.unwrap();
        assert_eq!(details["customer.phone"][0], "Phone format: (99) 99999-9999.");
    }
}
