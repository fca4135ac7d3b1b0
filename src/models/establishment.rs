// src/models/establishment.rs

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// 1. Establishment (O "Estabelecimento")
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Establishment {
    pub id: Uuid,
    #[schema(ignore)]
    pub owner_user_id: Uuid,
    #[schema(example = "Barbearia do Zé")]
    pub name: String,
    #[schema(example = "barbearia-do-ze")]
    pub slug: String,
    #[schema(example = "America/Sao_Paulo")]
    pub timezone: String,
    pub booking_enabled: bool,
    pub auto_confirm_bookings: bool,
    #[schema(example = 15)]
    pub slot_interval_minutes: i32,
    #[schema(example = 0)]
    pub buffer_minutes: i32,
    #[schema(example = 30)]
    pub max_future_days: i32,
    #[schema(example = 2)]
    pub reschedule_min_hours: i32,
    pub ask_email: bool,
    pub ask_notes: bool,
    pub require_policy_acceptance: bool,
    pub cancellation_policy_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Configuração de agenda do estabelecimento, já validada.
///
/// É passada explicitamente para o resolvedor de calendário e para o gerador
/// de horários, que assim continuam funções puras das suas entradas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingSettings {
    pub timezone: Tz,
    pub slot_interval_minutes: i64,
    pub buffer_minutes: i64,
    pub max_future_days: i64,
    pub reschedule_min_hours: i64,
}

impl Establishment {
    pub fn booking_settings(&self) -> Result<BookingSettings, AppError> {
        let timezone: Tz = self.timezone.parse().map_err(|_| {
            AppError::InternalServerError(anyhow::anyhow!(
                "Fuso horário inválido '{}' no estabelecimento {}",
                self.timezone,
                self.id
            ))
        })?;

        Ok(BookingSettings {
            timezone,
            // Intervalo zero travaria o laço do gerador
            slot_interval_minutes: i64::from(self.slot_interval_minutes.max(1)),
            buffer_minutes: i64::from(self.buffer_minutes.max(0)),
            max_future_days: i64::from(self.max_future_days.max(0)),
            reschedule_min_hours: i64::from(self.reschedule_min_hours.max(0)),
        })
    }
}

// ---
// 2. Professional e Service
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Professional {
    pub id: Uuid,
    #[schema(ignore)]
    pub establishment_id: Uuid,
    #[schema(example = "Maria")]
    pub name: String,
    pub slug: Option<String>,
    pub photo_url: Option<String>,
    pub active: bool,
    // Quantos atendimentos simultâneos o recurso comporta (ex: sala com N macas)
    #[schema(example = 1)]
    pub capacity: i32,
    pub portal_enabled: bool,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub portal_password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    #[schema(ignore)]
    pub establishment_id: Uuid,
    #[schema(example = "Corte de cabelo")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = 30)]
    pub duration_minutes: i32,
    #[schema(example = 4500)]
    pub price_cents: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ---
// 3. Horários e bloqueios
// ---
// weekday: 0 = domingo .. 6 = sábado
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHours {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub weekday: i16,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub open_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:00:00")]
    pub close_time: Option<NaiveTime>,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalHours {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub weekday: i16,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub closed: bool,
}

/// Bloqueio pontual (feriado, folga). `professional_id` nulo vale para todos.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Bloqueio semanal (ex: almoço toda terça).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTimeBlock {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub weekday: i16,
    #[schema(value_type = String, example = "12:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "13:00:00")]
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn establishment(timezone: &str, interval: i32) -> Establishment {
        Establishment {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            name: "Studio".into(),
            slug: "studio".into(),
            timezone: timezone.into(),
            booking_enabled: true,
            auto_confirm_bookings: false,
            slot_interval_minutes: interval,
            buffer_minutes: 5,
            max_future_days: 30,
            reschedule_min_hours: 2,
            ask_email: true,
            ask_notes: true,
            require_policy_acceptance: false,
            cancellation_policy_text: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn settings_parse_timezone_and_clamp_interval() {
        let settings = establishment("America/Sao_Paulo", 0).booking_settings().unwrap();
        assert_eq!(settings.timezone, chrono_tz::America::Sao_Paulo);
        assert_eq!(settings.slot_interval_minutes, 1);
        assert_eq!(settings.buffer_minutes, 5);
    }

    #[test]
    fn unknown_timezone_is_an_internal_error() {
        let err = establishment("Mars/Olympus", 15).booking_settings().unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));
    }
}
