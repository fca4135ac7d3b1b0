// src/handlers/subscription.rs

use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::subscription::{QuotaDecision, SubscriptionUsage},
};

// GET /api/subscription/usage
#[utoipa::path(
    get,
    path = "/api/subscription/usage",
    tag = "Subscription",
    params(("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")),
    responses(
        (status = 200, description = "Plano, limites e uso do mês", body = SubscriptionUsage)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_usage(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<Json<SubscriptionUsage>, ApiError> {
    let usage = app_state
        .quota_service
        .usage(&app_state.db_pool, tenant.0, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(usage))
}

// GET /api/subscription/can-create-professional
#[utoipa::path(
    get,
    path = "/api/subscription/can-create-professional",
    tag = "Subscription",
    params(("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")),
    responses(
        (status = 200, description = "Se o plano comporta mais um profissional", body = QuotaDecision)
    ),
    security(("api_jwt" = []))
)]
pub async fn can_create_professional(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<Json<QuotaDecision>, ApiError> {
    let decision = app_state
        .quota_service
        .can_create_professional(&app_state.db_pool, tenant.0, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(decision))
}

// GET /api/subscription/can-create-appointment
#[utoipa::path(
    get,
    path = "/api/subscription/can-create-appointment",
    tag = "Subscription",
    params(("x-establishment-id" = Uuid, Header, description = "ID do estabelecimento")),
    responses(
        (status = 200, description = "Se o plano comporta mais um agendamento neste mês", body = QuotaDecision)
    ),
    security(("api_jwt" = []))
)]
pub async fn can_create_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<Json<QuotaDecision>, ApiError> {
    let decision = app_state
        .quota_service
        .can_create_appointment(&app_state.db_pool, tenant.0, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(decision))
}
