use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::appointment::AppointmentStatus,
};

/// Motivos de "existe, mas a regra de negócio não deixa".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "code")]
pub enum PolicyViolation {
    BookingDisabled,
    ServiceInactive,
    ProfessionalInactive,
    ServiceNotOffered,
    PolicyAcceptanceRequired,
    LeadTimeNotMet { min_hours: i64 },
    OutsideBookingWindow { max_future_days: i64 },
    StartInPast,
}

impl PolicyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyViolation::BookingDisabled => "policy.booking_disabled",
            PolicyViolation::ServiceInactive => "policy.service_inactive",
            PolicyViolation::ProfessionalInactive => "policy.professional_inactive",
            PolicyViolation::ServiceNotOffered => "policy.service_not_offered",
            PolicyViolation::PolicyAcceptanceRequired => "policy.acceptance_required",
            PolicyViolation::LeadTimeNotMet { .. } => "policy.lead_time_not_met",
            PolicyViolation::OutsideBookingWindow { .. } => "policy.outside_booking_window",
            PolicyViolation::StartInPast => "policy.start_in_past",
        }
    }

    fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            PolicyViolation::LeadTimeNotMet { min_hours } => vec![("hours", min_hours.to_string())],
            PolicyViolation::OutsideBookingWindow { max_future_days } => {
                vec![("days", max_future_days.to_string())]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaResource {
    Professionals,
    AppointmentsMonth,
}

// Nosso tipo de erro, agora com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Estabelecimento não encontrado")]
    EstablishmentNotFound,

    #[error("Serviço não encontrado")]
    ServiceNotFound,

    #[error("Profissional não encontrado")]
    ProfessionalNotFound,

    #[error("Agendamento não encontrado")]
    AppointmentNotFound,

    #[error("Violação de política: {0:?}")]
    PolicyViolation(PolicyViolation),

    #[error("Limite do plano atingido ({resource:?}: {usage}/{limit})")]
    QuotaExceeded {
        resource: QuotaResource,
        limit: i64,
        usage: i64,
    },

    #[error("Horário não está mais disponível")]
    SlotNoLongerAvailable,

    #[error("Token de gerenciamento inválido")]
    TokenInvalid,

    #[error("Token de gerenciamento expirado")]
    TokenExpired,

    #[error("Transição inválida: {action} a partir de {from:?}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: &'static str,
    },

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Acesso negado")]
    Forbidden,

    // Variante para erros de banco de dados (exemplo com sqlx)
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn policy(violation: PolicyViolation) -> Self {
        AppError::PolicyViolation(violation)
    }

    /// Chave do catálogo de mensagens (`locales/*.json`).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation.failed",
            AppError::InvalidInput(_) => "validation.invalid_input",
            AppError::EstablishmentNotFound => "not_found.establishment",
            AppError::ServiceNotFound => "not_found.service",
            AppError::ProfessionalNotFound => "not_found.professional",
            AppError::AppointmentNotFound => "not_found.appointment",
            AppError::PolicyViolation(v) => v.code(),
            AppError::QuotaExceeded { resource: QuotaResource::Professionals, .. } => {
                "quota.professionals"
            }
            AppError::QuotaExceeded { resource: QuotaResource::AppointmentsMonth, .. } => {
                "quota.appointments_month"
            }
            AppError::SlotNoLongerAvailable => "slot.no_longer_available",
            AppError::TokenInvalid => "token.invalid",
            AppError::TokenExpired => "token.expired",
            AppError::InvalidTransition { .. } => "appointment.invalid_transition",
            AppError::EmailAlreadyExists => "auth.email_exists",
            AppError::InvalidCredentials => "auth.invalid_credentials",
            AppError::InvalidToken => "auth.invalid_token",
            AppError::UserNotFound => "auth.user_not_found",
            AppError::Forbidden => "auth.forbidden",
            _ => "internal.unexpected",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EstablishmentNotFound
            | AppError::ServiceNotFound
            | AppError::ProfessionalNotFound
            | AppError::AppointmentNotFound
            | AppError::UserNotFound
            | AppError::TokenInvalid => StatusCode::NOT_FOUND,
            AppError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::SlotNoLongerAvailable
            | AppError::InvalidTransition { .. }
            | AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::TokenExpired => StatusCode::GONE,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte o erro de domínio em resposta HTTP traduzida.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status();
        let lang = locale.0.as_str();

        let (message, details) = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                collect_field_errors(errors, "", lang, i18n, &mut details);
                (i18n.translate(lang, self.code(), &[]), Some(Value::Object(details)))
            }
            AppError::InvalidInput(reason) => (
                i18n.translate(lang, self.code(), &[("reason", reason.clone())]),
                None,
            ),
            AppError::PolicyViolation(violation) => (
                i18n.translate(lang, self.code(), &violation.args()),
                Some(json!({ "reason": violation })),
            ),
            AppError::QuotaExceeded { resource, limit, usage } => (
                i18n.translate(
                    lang,
                    self.code(),
                    &[("limit", limit.to_string()), ("usage", usage.to_string())],
                ),
                Some(json!({ "resource": resource, "limit": limit, "usage": usage })),
            ),
            AppError::InvalidTransition { from, action } => (
                i18n.translate(lang, self.code(), &[]),
                Some(json!({ "from": from, "action": action })),
            ),
            e if status == StatusCode::INTERNAL_SERVER_ERROR => {
                // O detalhe fica só no log
                tracing::error!("Erro Interno do Servidor: {}", e);
                (i18n.translate(lang, self.code(), &[]), None)
            }
            _ => (i18n.translate(lang, self.code(), &[]), None),
        };

        ApiError {
            status,
            error: message,
            code: Some(self.code().to_string()),
            details,
        }
    }
}

// Achata erros aninhados em "customer.phone", "items[0].name"...
fn collect_field_errors(
    errors: &validator::ValidationErrors,
    prefix: &str,
    lang: &str,
    i18n: &I18nStore,
    out: &mut serde_json::Map<String, Value>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages: Vec<Value> = field_errors
                    .iter()
                    .map(|e| {
                        let code = format!("field.{}", e.code);
                        Value::String(i18n.translate(lang, &code, &[]))
                    })
                    .collect();
                out.insert(path, Value::Array(messages));
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &path, lang, i18n, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{}[{}]", path, index), lang, i18n, out);
                }
            }
        }
    }
}

/// Rejeição HTTP já traduzida.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.error });
        if let Some(code) = self.code {
            body["code"] = Value::String(code);
        }
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> I18nStore {
        I18nStore::load().unwrap()
    }

    #[test]
    fn slot_conflict_maps_to_409_with_specific_message() {
        let api = AppError::SlotNoLongerAvailable.to_api_error(&Locale("pt".into()), &store());
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code.as_deref(), Some("slot.no_longer_available"));
        assert!(!api.error.is_empty());
        assert_ne!(api.error, "slot.no_longer_available");
    }

    #[test]
    fn quota_error_exposes_limit_and_usage() {
        let err = AppError::QuotaExceeded {
            resource: QuotaResource::AppointmentsMonth,
            limit: 100,
            usage: 100,
        };
        let api = err.to_api_error(&Locale("en".into()), &store());
        assert_eq!(api.status, StatusCode::PAYMENT_REQUIRED);
        let details = api.details.unwrap();
        assert_eq!(details["limit"], 100);
        assert_eq!(details["usage"], 100);
        assert!(api.error.contains("100"));
    }

    #[test]
    fn token_errors_do_not_look_like_not_found_appointments() {
        let invalid = AppError::TokenInvalid.to_api_error(&Locale("en".into()), &store());
        let expired = AppError::TokenExpired.to_api_error(&Locale("en".into()), &store());
        assert_eq!(invalid.code.as_deref(), Some("token.invalid"));
        assert_eq!(expired.status, StatusCode::GONE);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::InternalServerError(anyhow::anyhow!("pool exhausted at 10.0.0.3"));
        let api = err.to_api_error(&Locale("en".into()), &store());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("10.0.0.3"));
    }

    #[test]
    fn lead_time_message_carries_the_hours() {
        let err = AppError::policy(PolicyViolation::LeadTimeNotMet { min_hours: 2 });
        let api = err.to_api_error(&Locale("pt".into()), &store());
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(api.error.contains('2'));
    }
}
