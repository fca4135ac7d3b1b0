// src/scheduling/policy.rs
//
// Regras de tempo que não dependem do banco: janela de reserva e
// antecedência mínima para o cliente mexer no agendamento.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::common::error::{AppError, PolicyViolation};
use crate::models::appointment::Actor;
use crate::models::establishment::BookingSettings;

/// Último dia local que aceita reservas.
pub fn last_bookable_date(now: DateTime<Utc>, settings: &BookingSettings) -> NaiveDate {
    now.with_timezone(&settings.timezone).date_naive() + Duration::days(settings.max_future_days)
}

/// O início precisa estar no futuro e dentro de `max_future_days`.
pub fn ensure_within_booking_window(
    start_at: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &BookingSettings,
) -> Result<(), AppError> {
    if start_at <= now {
        return Err(AppError::policy(PolicyViolation::StartInPast));
    }

    let start_date = start_at.with_timezone(&settings.timezone).date_naive();
    if start_date > last_bookable_date(now, settings) {
        return Err(AppError::policy(PolicyViolation::OutsideBookingWindow {
            max_future_days: settings.max_future_days,
        }));
    }
    Ok(())
}

/// Clientes só remarcam ou cancelam com `reschedule_min_hours` de antecedência.
pub fn ensure_lead_time(
    actor: &Actor,
    current_start: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &BookingSettings,
) -> Result<(), AppError> {
    if actor.bypasses_lead_time() {
        return Ok(());
    }
    if current_start - now > Duration::hours(settings.reschedule_min_hours) {
        return Ok(());
    }
    Err(AppError::policy(PolicyViolation::LeadTimeNotMet {
        min_hours: settings.reschedule_min_hours,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::appointment::ActorType;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn settings() -> BookingSettings {
        BookingSettings {
            timezone: chrono_tz::America::Sao_Paulo,
            slot_interval_minutes: 15,
            buffer_minutes: 0,
            max_future_days: 30,
            reschedule_min_hours: 2,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap()
    }

    #[test]
    fn customer_inside_lead_time_is_refused() {
        let start = now() + Duration::minutes(90);
        let err = ensure_lead_time(&Actor::customer(), start, now(), &settings()).unwrap_err();
        assert!(matches!(
            err,
            AppError::PolicyViolation(PolicyViolation::LeadTimeNotMet { min_hours: 2 })
        ));
    }

    #[test]
    fn owner_ignores_lead_time() {
        let start = now() + Duration::minutes(90);
        let owner = Actor::member(ActorType::Admin, Uuid::new_v4());
        assert!(ensure_lead_time(&owner, start, now(), &settings()).is_ok());
    }

    #[test]
    fn customer_with_enough_notice_is_accepted() {
        let start = now() + Duration::hours(3);
        assert!(ensure_lead_time(&Actor::customer(), start, now(), &settings()).is_ok());
    }

    #[test]
    fn booking_window_rejects_past_and_far_future() {
        let s = settings();
        assert!(matches!(
            ensure_within_booking_window(now() - Duration::minutes(1), now(), &s),
            Err(AppError::PolicyViolation(PolicyViolation::StartInPast))
        ));
        assert!(matches!(
            ensure_within_booking_window(now() + Duration::days(31), now(), &s),
            Err(AppError::PolicyViolation(PolicyViolation::OutsideBookingWindow { max_future_days: 30 }))
        ));
        assert!(ensure_within_booking_window(now() + Duration::days(30), now(), &s).is_ok());
    }
}
