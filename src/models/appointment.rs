// src/models/appointment.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use regex::Regex;
use validator::Validate;

use crate::common::error::AppError;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Confirmed,
    Completed,
    Canceled,
    NoShow,
}

/// Ações que mudam o estado de um agendamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Confirm,
    Cancel,
    Complete,
    NoShow,
    Reschedule,
}

impl StatusAction {
    pub fn name(self) -> &'static str {
        match self {
            StatusAction::Confirm => "confirm",
            StatusAction::Cancel => "cancel",
            StatusAction::Complete => "complete",
            StatusAction::NoShow => "no_show",
            StatusAction::Reschedule => "reschedule",
        }
    }

    pub fn event_type(self) -> AppointmentEventType {
        match self {
            StatusAction::Confirm => AppointmentEventType::Confirmed,
            StatusAction::Cancel => AppointmentEventType::Canceled,
            StatusAction::Complete => AppointmentEventType::Completed,
            StatusAction::NoShow => AppointmentEventType::NoShowMarked,
            StatusAction::Reschedule => AppointmentEventType::Rescheduled,
        }
    }
}

impl AppointmentStatus {
    /// Ocupa a agenda do profissional.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Booked | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Máquina de estados. Remarcar preserva o status atual.
    pub fn apply(self, action: StatusAction) -> Result<AppointmentStatus, AppError> {
        use AppointmentStatus::*;

        let next = match (self, action) {
            (Booked, StatusAction::Confirm) => Confirmed,
            (Booked | Confirmed, StatusAction::Cancel) => Canceled,
            (Booked | Confirmed, StatusAction::Complete) => Completed,
            (Booked | Confirmed, StatusAction::NoShow) => NoShow,
            (Booked | Confirmed, StatusAction::Reschedule) => self,
            _ => {
                return Err(AppError::InvalidTransition {
                    from: self,
                    action: action.name(),
                })
            }
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventType {
    Created,
    Confirmed,
    Rescheduled,
    ProfessionalChanged,
    Canceled,
    Completed,
    NoShowMarked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "event_actor_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Customer,
    Admin,
    Staff,
    System,
}

/// Quem está pedindo a mudança. Clientes ficam sujeitos à antecedência mínima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub kind: ActorType,
    pub user_id: Option<Uuid>,
}

impl Actor {
    pub fn customer() -> Self {
        Self { kind: ActorType::Customer, user_id: None }
    }

    pub fn member(kind: ActorType, user_id: Uuid) -> Self {
        Self { kind, user_id: Some(user_id) }
    }

    pub fn bypasses_lead_time(&self) -> bool {
        self.kind != ActorType::Customer
    }
}

// --- Linhas ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    #[schema(ignore)]
    pub establishment_id: Uuid,
    pub professional_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub customer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_at - self.start_at).num_minutes()
    }

    /// Fotografia usada nos payloads de auditoria.
    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "professionalId": self.professional_id,
            "startAt": self.start_at,
            "endAt": self.end_at,
            "status": self.status,
        })
    }
}

/// Trilha de auditoria: uma linha por transição, nunca alterada.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEvent {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub event_type: AppointmentEventType,
    pub actor_type: ActorType,
    pub actor_user_id: Option<Uuid>,
    pub from_payload: Option<Value>,
    pub to_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[schema(ignore)]
    pub establishment_id: Uuid,
    pub name: String,
    #[schema(example = "11987654321")]
    pub phone: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ManageTokenRow {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Agendamento com nomes, para a tela de gerenciamento e o portal.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub establishment_name: String,
    pub professional_id: Uuid,
    pub professional_name: String,
    pub service_id: Uuid,
    pub service_name: String,
    pub customer_name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub customer_notes: Option<String>,
}

/// O que o cliente vê ao abrir o link de gerenciamento.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManageAppointmentView {
    pub appointment: AppointmentView,
    /// Ainda dá para remarcar/cancelar pelo link (status ativo e antecedência respeitada).
    pub can_self_manage: bool,
    pub reschedule_min_hours: i64,
    pub cancellation_policy_text: Option<String>,
    pub token_expires_at: DateTime<Utc>,
}

// --- Entradas ---

/// Dados do cliente informados no agendamento público.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 100, code = "length"))]
    #[schema(example = "João da Silva")]
    pub name: String,

    #[validate(regex(path = *PHONE_RE, code = "phone"))]
    #[schema(example = "(11) 98765-4321")]
    pub phone: String,

    #[validate(email(code = "email"))]
    pub email: Option<String>,

    #[validate(length(max = 500, code = "length"))]
    pub notes: Option<String>,
}

/// Aceita `(99) 9999-9999` e `(99) 99999-9999`, espaço e hífen opcionais.
pub static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d{2}\) ?\d{4,5}-?\d{4}$").expect("regex de telefone inválida"));

/// Chave natural do cliente: só os dígitos do telefone.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booked_can_be_confirmed_and_then_completed() {
        let confirmed = AppointmentStatus::Booked.apply(StatusAction::Confirm).unwrap();
        assert_eq!(confirmed, AppointmentStatus::Confirmed);
        assert_eq!(
            confirmed.apply(StatusAction::Complete).unwrap(),
            AppointmentStatus::Completed
        );
    }

    #[test]
    fn reschedule_keeps_status() {
        for status in [AppointmentStatus::Booked, AppointmentStatus::Confirmed] {
            assert_eq!(status.apply(StatusAction::Reschedule).unwrap(), status);
        }
    }

    #[test]
    fn terminal_states_reject_every_action() {
        let actions = [
            StatusAction::Confirm,
            StatusAction::Cancel,
            StatusAction::Complete,
            StatusAction::NoShow,
            StatusAction::Reschedule,
        ];
        for status in [
            AppointmentStatus::Canceled,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
        ] {
            assert!(status.is_terminal());
            for action in actions {
                let err = status.apply(action).unwrap_err();
                assert!(
                    matches!(err, AppError::InvalidTransition { from, .. } if from == status),
                    "{:?} + {:?}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn confirming_twice_is_rejected() {
        assert!(matches!(
            AppointmentStatus::Confirmed.apply(StatusAction::Confirm),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn only_customers_are_bound_by_lead_time() {
        assert!(!Actor::customer().bypasses_lead_time());
        assert!(Actor::member(ActorType::Staff, Uuid::new_v4()).bypasses_lead_time());
        assert!(Actor::member(ActorType::Admin, Uuid::new_v4()).bypasses_lead_time());
    }

    fn customer(phone: &str) -> CustomerInput {
        CustomerInput {
            name: "Ana".to_string(),
            phone: phone.to_string(),
            email: None,
            notes: None,
        }
    }

    #[test]
    fn phone_format_follows_the_booking_form() {
        for ok in ["(11) 98765-4321", "(11)98765-4321", "(11) 3456-7890", "(11) 987654321"] {
            assert!(customer(ok).validate().is_ok(), "{}", ok);
        }
        for bad in ["11987654321", "(11) 9876-54321", "(1) 98765-4321", "(11) 98765-432", " (11) 98765-4321", ""] {
            let errors = customer(bad).validate().unwrap_err();
            assert_eq!(errors.field_errors()["phone"][0].code, "phone", "{}", bad);
        }
    }

    #[test]
    fn phone_normalization_keeps_digits_only() {
        assert_eq!(normalize_phone("(11) 98765-4321"), "11987654321");
        assert_eq!(normalize_phone("(11)98765-4321"), "11987654321");
    }
}
