// src/handlers/billing.rs
//
// Webhook do integrador de pagamentos. Só aplica o efeito (plano/status);
// cobrança em si fica fora daqui.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::subscription::SubscriptionStatusEvent,
    services::{billing_service::BillingOutcome, token_service::hash_token},
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Serialize, ToSchema)]
pub struct BillingEventResponse {
    pub outcome: BillingOutcome,
}

/// Sem segredo configurado o webhook fica desligado.
/// Compara os hashes para não depender do tamanho do segredo.
pub fn check_webhook_secret(expected: Option<&str>, presented: Option<&str>) -> Result<(), AppError> {
    let expected = expected.ok_or(AppError::Forbidden)?;
    let presented = presented.ok_or(AppError::InvalidToken)?;

    if hash_token(expected) == hash_token(presented) {
        Ok(())
    } else {
        Err(AppError::InvalidToken)
    }
}

// POST /api/billing/subscription-events
#[utoipa::path(
    post,
    path = "/api/billing/subscription-events",
    tag = "Billing",
    request_body = SubscriptionStatusEvent,
    params(("x-webhook-secret" = String, Header, description = "Segredo compartilhado com o integrador")),
    responses(
        (status = 200, description = "Evento aplicado ou repetido", body = BillingEventResponse),
        (status = 401, description = "Segredo ausente ou incorreto"),
        (status = 403, description = "Webhook desligado")
    )
)]
pub async fn subscription_event(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    Json(event): Json<SubscriptionStatusEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    check_webhook_secret(app_state.settings.billing_webhook_secret.as_deref(), presented)
        .map_err(|e| {
            tracing::warn!("Webhook de cobrança recusado: {}", e);
            e.to_api_error(&locale, &app_state.i18n_store)
        })?;

    let outcome = app_state
        .billing_service
        .apply_subscription_event(&app_state.db_pool, &event, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(BillingEventResponse { outcome })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_is_off_without_a_configured_secret() {
        assert!(matches!(check_webhook_secret(None, Some("qualquer")), Err(AppError::Forbidden)));
    }

    #[test]
    fn presented_secret_must_match() {
        assert!(check_webhook_secret(Some("s3cr3t"), Some("s3cr3t")).is_ok());
        assert!(matches!(check_webhook_secret(Some("s3cr3t"), Some(" s3cr3t ")), Err(AppError::InvalidToken)));
        assert!(matches!(check_webhook_secret(Some("s3cr3t"), Some("errado")), Err(AppError::InvalidToken)));
        assert!(matches!(check_webhook_secret(Some("s3cr3t"), None), Err(AppError::InvalidToken)));
    }
}
