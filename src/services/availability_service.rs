// src/services/availability_service.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{AppError, PolicyViolation},
    db::{AppointmentRepository, EstablishmentRepository},
    models::{
        appointment::Appointment,
        availability::{Availability, AvailabilityDay, AvailableSlot, NotBookableReason},
        establishment::{BookingSettings, Establishment, Professional, Service},
    },
    scheduling::{
        format_minute, generate_slots, policy::last_bookable_date, CalendarRules, LocalDay, MinuteRange,
        SlotRequest,
    },
};

/// Pedido de horário de um profissional para um serviço.
pub fn slot_request(settings: &BookingSettings, service: &Service, professional: &Professional) -> SlotRequest {
    SlotRequest {
        duration_minutes: i64::from(service.duration_minutes),
        buffer_minutes: settings.buffer_minutes,
        interval_minutes: settings.slot_interval_minutes,
        capacity: i64::from(professional.capacity),
    }
}

/// Ocupação do profissional no dia, em minutos locais.
pub fn occupied_ranges(appointments: &[Appointment], professional_id: Uuid, day: &LocalDay) -> Vec<MinuteRange> {
    appointments
        .iter()
        .filter(|a| a.professional_id == professional_id && a.status.is_active())
        .map(|a| day.range_of(a.start_at, a.end_at))
        .collect()
}

/// Primeiro minuto de hoje que ainda pode ser agendado: estritamente depois de `now`.
pub fn first_bookable_minute(today: &LocalDay, now: DateTime<Utc>) -> i64 {
    today.minute_floor(now) + 1
}

/// Horários de um dia para uma lista de profissionais.
///
/// Cada horário sai uma vez só, com o primeiro profissional da lista que o
/// tem livre. A ordem da lista é a ordem de preferência.
pub fn day_slots(
    rules: &CalendarRules,
    professionals: &[Professional],
    appointments: &[Appointment],
    service: &Service,
    settings: &BookingSettings,
    day: &LocalDay,
    not_before: Option<i64>,
) -> Vec<AvailableSlot> {
    let mut chosen: BTreeMap<i64, Uuid> = BTreeMap::new();

    for professional in professionals {
        let open = rules.open_intervals(professional.id, day);
        if open.is_empty() {
            continue;
        }
        let occupied = occupied_ranges(appointments, professional.id, day);
        let request = slot_request(settings, service, professional);

        for minute in generate_slots(&open, &occupied, &request, not_before) {
            // Horário que não existe no relógio local (virada do horário de verão) fica de fora
            if day.instant_at(minute).is_some() {
                chosen.entry(minute).or_insert(professional.id);
            }
        }
    }

    chosen
        .into_iter()
        .map(|(minute, professional_id)| AvailableSlot {
            time: format_minute(minute),
            professional_id,
        })
        .collect()
}

/// Dias `[from, to]` que valem para reserva a partir de `now`.
pub fn clamp_range(
    from: NaiveDate,
    to: Option<NaiveDate>,
    now: DateTime<Utc>,
    settings: &BookingSettings,
) -> Vec<NaiveDate> {
    let today = now.with_timezone(&settings.timezone).date_naive();
    let start = from.max(today);
    let end = to.unwrap_or(from).min(last_bookable_date(now, settings));

    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Carrega as regras de calendário que tocam a janela.
pub async fn load_calendar_rules(
    establishments: &EstablishmentRepository,
    conn: &mut PgConnection,
    establishment_id: Uuid,
    professional_ids: &[Uuid],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<CalendarRules, AppError> {
    Ok(CalendarRules {
        business_hours: establishments.list_business_hours(&mut *conn, establishment_id).await?,
        professional_hours: establishments.list_professional_hours(&mut *conn, professional_ids).await?,
        recurring_blocks: establishments.list_recurring_blocks(&mut *conn, establishment_id).await?,
        time_blocks: establishments
            .list_time_blocks(&mut *conn, establishment_id, from, to)
            .await?,
    })
}

/// Parâmetros da consulta de disponibilidade.
#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub slug: String,
    pub service_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    establishments: EstablishmentRepository,
    appointments: AppointmentRepository,
}

impl AvailabilityService {
    pub fn new(establishments: EstablishmentRepository, appointments: AppointmentRepository) -> Self {
        Self { establishments, appointments }
    }

    /// Só leitura: pode ver um estado levemente atrasado. A criação revalida.
    pub async fn get_availability<'e, E>(
        &self,
        executor: E,
        query: &AvailabilityQuery,
        now: DateTime<Utc>,
    ) -> Result<Availability, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let establishment = self
            .establishments
            .find_by_slug(&mut *conn, &query.slug)
            .await?
            .ok_or(AppError::EstablishmentNotFound)?;
        if !establishment.booking_enabled {
            return Ok(Availability::NotBookable {
                reason: NotBookableReason::BookingDisabled,
            });
        }

        let service = self
            .establishments
            .find_service(&mut *conn, establishment.id, query.service_id)
            .await?
            .ok_or(AppError::ServiceNotFound)?;
        if !service.active {
            return Ok(Availability::NotBookable {
                reason: NotBookableReason::ServiceInactive,
            });
        }

        let professionals = self
            .eligible_professionals(&mut conn, &establishment, &service, query.professional_id)
            .await?;

        let settings = establishment.booking_settings()?;
        let dates = clamp_range(query.from, query.to, now, &settings);
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(Availability::Bookable { days: Vec::new() });
        };

        let (window_from, _) = LocalDay::new(*first, settings.timezone).query_window();
        let (_, window_to) = LocalDay::new(*last, settings.timezone).query_window();
        let ids: Vec<Uuid> = professionals.iter().map(|p| p.id).collect();

        let rules = load_calendar_rules(
            &self.establishments,
            &mut conn,
            establishment.id,
            &ids,
            window_from,
            window_to,
        )
        .await?;
        let appointments = self
            .appointments
            .list_active_in_range(&mut *conn, &ids, window_from, window_to, None)
            .await?;

        let (today, _) = LocalDay::containing(now, settings.timezone);
        let not_before_today = first_bookable_minute(&today, now);

        let days = dates
            .iter()
            .map(|date| {
                let day = LocalDay::new(*date, settings.timezone);
                let not_before = (*date == today.date).then_some(not_before_today);
                AvailabilityDay {
                    date: *date,
                    slots: day_slots(&rules, &professionals, &appointments, &service, &settings, &day, not_before),
                }
            })
            .collect();

        tracing::debug!(
            establishment = %establishment.slug,
            service_id = %service.id,
            days = dates.len(),
            "Disponibilidade calculada"
        );

        Ok(Availability::Bookable { days })
    }

    async fn eligible_professionals(
        &self,
        conn: &mut PgConnection,
        establishment: &Establishment,
        service: &Service,
        professional_id: Option<Uuid>,
    ) -> Result<Vec<Professional>, AppError> {
        let Some(professional_id) = professional_id else {
            return self
                .establishments
                .list_professionals_for_service(&mut *conn, establishment.id, service.id)
                .await;
        };

        let professional = self
            .establishments
            .find_professional(&mut *conn, establishment.id, professional_id)
            .await?
            .ok_or(AppError::ProfessionalNotFound)?;
        if !professional.active {
            return Err(AppError::policy(PolicyViolation::ProfessionalInactive));
        }
        if !self
            .establishments
            .professional_offers_service(&mut *conn, professional.id, service.id)
            .await?
        {
            return Err(AppError::policy(PolicyViolation::ServiceNotOffered));
        }
        Ok(vec![professional])
    }
}

/// Fim de um atendimento que começa em `start_at`.
pub fn end_for(start_at: DateTime<Utc>, service: &Service) -> DateTime<Utc> {
    start_at + Duration::minutes(i64::from(service.duration_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        appointment::AppointmentStatus,
        establishment::BusinessHours,
    };
    use chrono::{NaiveTime, TimeZone};
    use chrono_tz::America::Sao_Paulo;

    fn settings() -> BookingSettings {
        BookingSettings {
            timezone: Sao_Paulo,
            slot_interval_minutes: 15,
            buffer_minutes: 0,
            max_future_days: 30,
            reschedule_min_hours: 2,
        }
    }

    fn professional(name: &str, establishment_id: Uuid) -> Professional {
        Professional {
            id: Uuid::new_v4(),
            establishment_id,
            name: name.into(),
            slug: None,
            photo_url: None,
            active: true,
            capacity: 1,
            portal_enabled: false,
            portal_password_hash: None,
            created_at: Utc::now(),
        }
    }

    fn service(establishment_id: Uuid) -> Service {
        Service {
            id: Uuid::new_v4(),
            establishment_id,
            name: "Corte".into(),
            description: None,
            duration_minutes: 30,
            price_cents: Some(4500),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn rules(establishment_id: Uuid) -> CalendarRules {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0);
        CalendarRules {
            business_hours: (0..7)
                .map(|weekday| BusinessHours {
                    id: Uuid::new_v4(),
                    establishment_id,
                    weekday,
                    open_time: t(9),
                    close_time: t(18),
                    closed: weekday == 0,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn appointment(professional: &Professional, service: &Service, start: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            establishment_id: professional.establishment_id,
            professional_id: professional.id,
            service_id: service.id,
            customer_id: Uuid::new_v4(),
            start_at: start,
            end_at: end_for(start, service),
            status: AppointmentStatus::Confirmed,
            customer_notes: None,
            created_at: Utc::now(),
        }
    }

    fn monday() -> LocalDay {
        LocalDay::new(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), Sao_Paulo)
    }

    #[test]
    fn any_professional_gets_the_first_free_one_per_slot() {
        let establishment_id = Uuid::new_v4();
        let ana = professional("Ana", establishment_id);
        let bruno = professional("Bruno", establishment_id);
        let svc = service(establishment_id);
        // Ana ocupada 10:00–10:30 (13:00 UTC)
        let busy = appointment(&ana, &svc, Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());

        let slots = day_slots(
            &rules(establishment_id),
            &[ana.clone(), bruno.clone()],
            &[busy],
            &svc,
            &settings(),
            &monday(),
            None,
        );

        let at = |time: &str| slots.iter().find(|s| s.time == time).map(|s| s.professional_id);
        assert_eq!(at("09:00"), Some(ana.id));
        assert_eq!(at("10:00"), Some(bruno.id));
        assert_eq!(at("10:30"), Some(ana.id));
        // Cada horário aparece uma vez só
        assert_eq!(slots.len(), 35);
    }

    #[test]
    fn canceled_appointments_do_not_occupy() {
        let establishment_id = Uuid::new_v4();
        let ana = professional("Ana", establishment_id);
        let svc = service(establishment_id);
        let mut canceled = appointment(&ana, &svc, Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());
        canceled.status = AppointmentStatus::Canceled;

        let slots = day_slots(&rules(establishment_id), &[ana], &[canceled], &svc, &settings(), &monday(), None);
        assert!(slots.iter().any(|s| s.time == "10:00"));
    }

    #[test]
    fn professional_without_hours_yields_an_empty_day() {
        let establishment_id = Uuid::new_v4();
        let ana = professional("Ana", establishment_id);
        let svc = service(establishment_id);
        let sunday = LocalDay::new(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), Sao_Paulo);

        let slots = day_slots(&rules(establishment_id), &[ana], &[], &svc, &settings(), &sunday, None);
        assert!(slots.is_empty());
    }

    #[test]
    fn the_current_minute_is_never_offered() {
        let establishment_id = Uuid::new_v4();
        let ana = professional("Ana", establishment_id);
        let svc = service(establishment_id);
        // 10:00:00 em São Paulo, em cima da grade
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap();
        let today = monday();
        assert_eq!(first_bookable_minute(&today, now), 601);
        assert_eq!(first_bookable_minute(&today, now + Duration::seconds(59)), 601);

        let slots = day_slots(
            &rules(establishment_id),
            &[ana],
            &[],
            &svc,
            &settings(),
            &today,
            Some(first_bookable_minute(&today, now)),
        );
        let times: Vec<&str> = slots.iter().map(|s| s.time.as_str()).collect();
        assert!(!times.contains(&"10:00"));
        assert_eq!(times.first(), Some(&"10:15"));
    }

    #[test]
    fn range_is_clamped_to_today_and_horizon() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap();
        let s = settings();

        let past = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let dates = clamp_range(past, Some(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()), now, &s);
        assert_eq!(dates.first(), Some(&NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()));
        assert_eq!(dates.len(), 3);

        let far = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert!(clamp_range(far, None, now, &s).is_empty());

        let all = clamp_range(past, Some(far), now, &s);
        assert_eq!(all.last(), Some(&NaiveDate::from_ymd_opt(2025, 4, 9).unwrap()));
    }

    #[test]
    fn availability_serializes_with_explicit_status() {
        let off = Availability::NotBookable {
            reason: NotBookableReason::BookingDisabled,
        };
        let json = serde_json::to_value(&off).unwrap();
        assert_eq!(json["status"], "not_bookable");
        assert_eq!(json["reason"], "booking_disabled");

        let empty = serde_json::to_value(Availability::Bookable { days: vec![] }).unwrap();
        assert_eq!(empty["status"], "bookable");
        assert!(empty["days"].as_array().unwrap().is_empty());
    }
}
