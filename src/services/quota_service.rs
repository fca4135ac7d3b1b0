// src/services/quota_service.rs
//
// Limites do plano contra o uso real, sempre contado na hora.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{AppError, QuotaResource},
    db::{AppointmentRepository, EstablishmentRepository, SubscriptionRepository},
    models::{
        establishment::Establishment,
        subscription::{Plan, QuotaDecision, Subscription, SubscriptionUsage},
    },
    scheduling::LocalDay,
};

/// `[início, fim)` do mês corrente no fuso do estabelecimento.
pub fn month_bounds(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&tz).date_naive();
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let next = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
    .unwrap_or(first);

    (
        LocalDay::new(first, tz).start_instant(),
        LocalDay::new(next, tz).start_instant(),
    )
}

/// Plano em vigor e a assinatura que o concedeu (se houver).
#[derive(Debug, Clone)]
pub struct EffectivePlan {
    pub plan: Plan,
    pub subscription: Option<Subscription>,
}

#[derive(Clone)]
pub struct QuotaService {
    establishments: EstablishmentRepository,
    appointments: AppointmentRepository,
    subscriptions: SubscriptionRepository,
    default_plan_code: String,
}

impl QuotaService {
    pub fn new(
        establishments: EstablishmentRepository,
        appointments: AppointmentRepository,
        subscriptions: SubscriptionRepository,
        default_plan_code: String,
    ) -> Self {
        Self {
            establishments,
            appointments,
            subscriptions,
            default_plan_code,
        }
    }

    /// Assinatura vigente do dono, ou o plano padrão. Sem assinatura não é erro.
    pub async fn effective_plan(
        &self,
        conn: &mut PgConnection,
        owner_user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EffectivePlan, AppError> {
        let subscription = self.subscriptions.find_by_owner(&mut *conn, owner_user_id).await?;

        if let Some(sub) = subscription.as_ref().filter(|s| s.grants_plan(now)) {
            if let Some(plan) = self.subscriptions.find_plan(&mut *conn, &sub.plan_code).await? {
                return Ok(EffectivePlan { plan, subscription });
            }
            tracing::warn!(plan_code = %sub.plan_code, "Plano da assinatura não existe; usando o padrão");
        }

        let plan = self
            .subscriptions
            .find_plan(&mut *conn, &self.default_plan_code)
            .await?
            .unwrap_or_else(Plan::builtin_basic);

        Ok(EffectivePlan { plan, subscription })
    }

    async fn load_establishment(&self, conn: &mut PgConnection, establishment_id: Uuid) -> Result<Establishment, AppError> {
        self.establishments
            .find_by_id(&mut *conn, establishment_id)
            .await?
            .ok_or(AppError::EstablishmentNotFound)
    }

    async fn appointments_this_month(
        &self,
        conn: &mut PgConnection,
        establishment: &Establishment,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let tz = establishment.booking_settings()?.timezone;
        let (from, to) = month_bounds(now, tz);
        self.appointments
            .count_created_between(&mut *conn, establishment.id, from, to)
            .await
    }

    /// Decisão para mais um agendamento, usada dentro da transação de criação.
    pub async fn appointment_decision(
        &self,
        conn: &mut PgConnection,
        establishment: &Establishment,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError> {
        let effective = self.effective_plan(&mut *conn, establishment.owner_user_id, now).await?;
        let usage = self.appointments_this_month(&mut *conn, establishment, now).await?;
        Ok(QuotaDecision::evaluate(
            effective.plan.max_appointments_month,
            usage,
            "agendamentos no mês",
        ))
    }

    /// Converte a recusa em `QuotaExceeded` com limite e uso.
    /// Trava o estabelecimento antes de contar: duas criações simultâneas não passam com a mesma contagem.
    pub async fn ensure_can_create_appointment(
        &self,
        conn: &mut PgConnection,
        establishment: &Establishment,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.establishments.lock_for_quota(&mut *conn, establishment.id).await? {
            return Err(AppError::EstablishmentNotFound);
        }
        let decision = self.appointment_decision(conn, establishment, now).await?;
        if decision.allowed {
            return Ok(());
        }
        Err(AppError::QuotaExceeded {
            resource: QuotaResource::AppointmentsMonth,
            limit: decision.limit.unwrap_or_default(),
            usage: decision.usage,
        })
    }

    // --- API pública ---

    pub async fn can_create_professional<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        let establishment = self.load_establishment(&mut conn, establishment_id).await?;
        let effective = self.effective_plan(&mut conn, establishment.owner_user_id, now).await?;
        let usage = self
            .establishments
            .count_active_professionals(&mut *conn, establishment_id)
            .await?;
        Ok(QuotaDecision::evaluate(
            effective.plan.max_professionals,
            usage,
            "profissionais",
        ))
    }

    pub async fn can_create_appointment<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        let establishment = self.load_establishment(&mut conn, establishment_id).await?;
        self.appointment_decision(&mut conn, &establishment, now).await
    }

    pub async fn usage<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionUsage, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        let establishment = self.load_establishment(&mut conn, establishment_id).await?;
        let EffectivePlan { plan, subscription } =
            self.effective_plan(&mut conn, establishment.owner_user_id, now).await?;

        let professionals = self
            .establishments
            .count_active_professionals(&mut *conn, establishment_id)
            .await?;
        let appointments = self.appointments_this_month(&mut conn, &establishment, now).await?;

        let professional_decision = QuotaDecision::evaluate(plan.max_professionals, professionals, "profissionais");
        let appointment_decision =
            QuotaDecision::evaluate(plan.max_appointments_month, appointments, "agendamentos no mês");

        Ok(SubscriptionUsage {
            plan_code: plan.code,
            plan_name: plan.name,
            status: subscription
                .as_ref()
                .map(|s| s.status.clone())
                .unwrap_or_else(|| "none".to_string()),
            current_period_end: subscription.as_ref().map(|s| s.current_period_end),
            max_professionals: professional_decision.limit,
            max_appointments_month: appointment_decision.limit,
            allow_multi_establishments: plan.allow_multi_establishments,
            current_professionals: professionals,
            current_appointments_month: appointments,
            can_add_professional: professional_decision.allowed,
            can_add_appointment: appointment_decision.allowed,
            professionals_remaining: professional_decision.remaining(),
            appointments_remaining: appointment_decision.remaining(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;

    #[test]
    fn month_bounds_follow_local_calendar() {
        // 1º de abril, 01:00 UTC ainda é 31 de março em São Paulo
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap();
        let (from, to) = month_bounds(now, Sao_Paulo);
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 3, 1, 3, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2025, 4, 1, 3, 0, 0).unwrap());
    }

    #[test]
    fn december_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap();
        let (from, to) = month_bounds(now, chrono_tz::UTC);
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }
}
