// src/db/establishment_repo.rs
//
// Leitura da configuração do estabelecimento: catálogo, horários e bloqueios.

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::establishment::{
        BusinessHours, Establishment, Professional, ProfessionalHours, RecurringTimeBlock, Service,
        TimeBlock,
    },
};

const ESTABLISHMENT_COLUMNS: &str = r#"
    id, owner_user_id, name, slug, timezone, booking_enabled, auto_confirm_bookings,
    slot_interval_minutes, buffer_minutes, max_future_days, reschedule_min_hours,
    ask_email, ask_notes, require_policy_acceptance, cancellation_policy_text, created_at
"#;

const PROFESSIONAL_COLUMNS: &str = r#"
    id, establishment_id, name, slug, photo_url, active, capacity,
    portal_enabled, portal_password_hash, created_at
"#;

#[derive(Clone)]
pub struct EstablishmentRepository {
    pool: PgPool,
}

impl EstablishmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  ESTABELECIMENTO
    // =========================================================================

    pub async fn find_by_slug<'e, E>(&self, executor: E, slug: &str) -> Result<Option<Establishment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM establishments WHERE slug = $1", ESTABLISHMENT_COLUMNS);
        let establishment = sqlx::query_as::<_, Establishment>(&sql)
            .bind(slug)
            .fetch_optional(executor)
            .await?;
        Ok(establishment)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Establishment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM establishments WHERE id = $1", ESTABLISHMENT_COLUMNS);
        let establishment = sqlx::query_as::<_, Establishment>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(establishment)
    }

    /// Serializa as criações de agendamento do estabelecimento até o fim da transação.
    /// `NO KEY UPDATE` não briga com as checagens de chave estrangeira das outras escritas.
    pub async fn lock_for_quota<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM establishments WHERE id = $1 FOR NO KEY UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(locked.is_some())
    }

    // =========================================================================
    //  CATÁLOGO
    // =========================================================================

    pub async fn find_service<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Service>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let service = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, establishment_id, name, description, duration_minutes, price_cents, active, created_at
            FROM services
            WHERE id = $1 AND establishment_id = $2
            "#,
        )
        .bind(service_id)
        .bind(establishment_id)
        .fetch_optional(executor)
        .await?;
        Ok(service)
    }

    pub async fn find_professional<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Professional>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM professionals WHERE id = $1 AND establishment_id = $2",
            PROFESSIONAL_COLUMNS
        );
        let professional = sqlx::query_as::<_, Professional>(&sql)
            .bind(professional_id)
            .bind(establishment_id)
            .fetch_optional(executor)
            .await?;
        Ok(professional)
    }

    /// Trava a linha do profissional até o fim da transação.
    /// Todas as escritas na agenda dele passam por aqui, uma de cada vez.
    pub async fn lock_professional<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Professional>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM professionals WHERE id = $1 AND establishment_id = $2 FOR UPDATE",
            PROFESSIONAL_COLUMNS
        );
        let professional = sqlx::query_as::<_, Professional>(&sql)
            .bind(professional_id)
            .bind(establishment_id)
            .fetch_optional(executor)
            .await?;
        Ok(professional)
    }

    pub async fn find_professional_by_slug<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        slug: &str,
    ) -> Result<Option<Professional>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM professionals WHERE establishment_id = $1 AND slug = $2",
            PROFESSIONAL_COLUMNS
        );
        let professional = sqlx::query_as::<_, Professional>(&sql)
            .bind(establishment_id)
            .bind(slug)
            .fetch_optional(executor)
            .await?;
        Ok(professional)
    }

    pub async fn professional_offers_service<'e, E>(
        &self,
        executor: E,
        professional_id: Uuid,
        service_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let offers = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM professional_services
                WHERE professional_id = $1 AND service_id = $2
            )
            "#,
        )
        .bind(professional_id)
        .bind(service_id)
        .fetch_one(executor)
        .await?;
        Ok(offers)
    }

    /// Profissionais ativos que fazem o serviço, em ordem de nome (ordem do "primeiro livre").
    pub async fn list_professionals_for_service<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        service_id: Uuid,
    ) -> Result<Vec<Professional>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {} FROM professionals p
            WHERE p.establishment_id = $1
              AND p.active
              AND EXISTS (
                  SELECT 1 FROM professional_services ps
                  WHERE ps.professional_id = p.id AND ps.service_id = $2
              )
            ORDER BY p.name ASC, p.id ASC
            "#,
            PROFESSIONAL_COLUMNS
        );
        let professionals = sqlx::query_as::<_, Professional>(&sql)
            .bind(establishment_id)
            .bind(service_id)
            .fetch_all(executor)
            .await?;
        Ok(professionals)
    }

    pub async fn count_active_professionals<'e, E>(&self, executor: E, establishment_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM professionals WHERE establishment_id = $1 AND active",
        )
        .bind(establishment_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn touch_portal_login<'e, E>(&self, executor: E, professional_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE professionals SET portal_last_login_at = NOW() WHERE id = $1")
            .bind(professional_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  HORÁRIOS E BLOQUEIOS
    // =========================================================================

    pub async fn list_business_hours<'e, E>(&self, executor: E, establishment_id: Uuid) -> Result<Vec<BusinessHours>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let hours = sqlx::query_as::<_, BusinessHours>(
            r#"
            SELECT id, establishment_id, weekday, open_time, close_time, closed
            FROM business_hours
            WHERE establishment_id = $1
            ORDER BY weekday
            "#,
        )
        .bind(establishment_id)
        .fetch_all(executor)
        .await?;
        Ok(hours)
    }

    pub async fn list_professional_hours<'e, E>(
        &self,
        executor: E,
        professional_ids: &[Uuid],
    ) -> Result<Vec<ProfessionalHours>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let hours = sqlx::query_as::<_, ProfessionalHours>(
            r#"
            SELECT id, professional_id, weekday, start_time, end_time, closed
            FROM professional_hours
            WHERE professional_id = ANY($1)
            ORDER BY professional_id, weekday
            "#,
        )
        .bind(professional_ids)
        .fetch_all(executor)
        .await?;
        Ok(hours)
    }

    pub async fn list_recurring_blocks<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
    ) -> Result<Vec<RecurringTimeBlock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let blocks = sqlx::query_as::<_, RecurringTimeBlock>(
            r#"
            SELECT id, establishment_id, professional_id, weekday, start_time, end_time, reason, active
            FROM recurring_time_blocks
            WHERE establishment_id = $1 AND active
            "#,
        )
        .bind(establishment_id)
        .fetch_all(executor)
        .await?;
        Ok(blocks)
    }

    /// Bloqueios pontuais que tocam `[from, to)`.
    pub async fn list_time_blocks<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let blocks = sqlx::query_as::<_, TimeBlock>(
            r#"
            SELECT id, establishment_id, professional_id, start_at, end_at, reason
            FROM time_blocks
            WHERE establishment_id = $1
              AND start_at < $3
              AND end_at > $2
            ORDER BY start_at
            "#,
        )
        .bind(establishment_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(blocks)
    }
}
