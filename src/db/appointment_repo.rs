// src/db/appointment_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::appointment::{
        ActorType, Appointment, AppointmentEvent, AppointmentEventType, AppointmentStatus,
        AppointmentView, Customer,
    },
};

const APPOINTMENT_COLUMNS: &str = r#"
    id, establishment_id, professional_id, service_id, customer_id,
    start_at, end_at, status, customer_notes, created_at
"#;

const VIEW_SELECT: &str = r#"
    SELECT
        a.id, a.establishment_id, e.name AS establishment_name,
        a.professional_id, p.name AS professional_name,
        a.service_id, s.name AS service_name,
        c.name AS customer_name,
        a.start_at, a.end_at, a.status, a.customer_notes
    FROM appointments a
    JOIN establishments e ON e.id = a.establishment_id
    JOIN professionals p ON p.id = a.professional_id
    JOIN services s ON s.id = a.service_id
    JOIN customers c ON c.id = a.customer_id
"#;

/// Linha nova de agendamento, já validada pelo serviço.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub establishment_id: Uuid,
    pub professional_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub customer_notes: Option<String>,
}

/// Uma linha da trilha de auditoria.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub appointment_id: Uuid,
    pub event_type: AppointmentEventType,
    pub actor_type: ActorType,
    pub actor_user_id: Option<Uuid>,
    pub from_payload: Option<Value>,
    pub to_payload: Option<Value>,
}

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  OCUPAÇÃO
    // =========================================================================

    /// Agendamentos ativos (booked/confirmed) dos profissionais que tocam `[from, to)`.
    /// `exclude` tira o próprio agendamento da conta numa remarcação.
    pub async fn list_active_in_range<'e, E>(
        &self,
        executor: E,
        professional_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {} FROM appointments
            WHERE professional_id = ANY($1)
              AND status IN ('booked', 'confirmed')
              AND start_at < $3
              AND end_at > $2
              AND ($4::uuid IS NULL OR id <> $4)
            ORDER BY start_at
            "#,
            APPOINTMENT_COLUMNS
        );
        let appointments = sqlx::query_as::<_, Appointment>(&sql)
            .bind(professional_ids)
            .bind(from)
            .bind(to)
            .bind(exclude)
            .fetch_all(executor)
            .await?;
        Ok(appointments)
    }

    /// Agendamentos criados em `[from, to)`, de qualquer status.
    pub async fn count_created_between<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE establishment_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(establishment_id)
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    // =========================================================================
    //  AGENDAMENTOS
    // =========================================================================

    pub async fn insert<'e, E>(&self, executor: E, new: &NewAppointment) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO appointments (
                establishment_id, professional_id, service_id, customer_id,
                start_at, end_at, status, customer_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(new.establishment_id)
            .bind(new.professional_id)
            .bind(new.service_id)
            .bind(new.customer_id)
            .bind(new.start_at)
            .bind(new.end_at)
            .bind(new.status)
            .bind(new.customer_notes.as_deref())
            .fetch_one(executor)
            .await?;
        Ok(appointment)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM appointments WHERE id = $1", APPOINTMENT_COLUMNS);
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(appointment)
    }

    /// Lê e trava o agendamento até o fim da transação.
    pub async fn lock<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM appointments WHERE id = $1 FOR UPDATE", APPOINTMENT_COLUMNS);
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(appointment)
    }

    pub async fn update_schedule<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        professional_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE appointments
            SET professional_id = $2, start_at = $3, end_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .bind(professional_id)
            .bind(start_at)
            .bind(end_at)
            .fetch_one(executor)
            .await?;
        Ok(appointment)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE appointments SET status = $2 WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        );
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(appointment)
    }

    pub async fn find_view<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<AppointmentView>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("{} WHERE a.id = $1", VIEW_SELECT);
        let view = sqlx::query_as::<_, AppointmentView>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(view)
    }

    /// Agenda do profissional (todos os status) que começa em `[from, to)`.
    pub async fn list_views_for_professional<'e, E>(
        &self,
        executor: E,
        professional_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppointmentView>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "{} WHERE a.professional_id = $1 AND a.start_at >= $2 AND a.start_at < $3 ORDER BY a.start_at",
            VIEW_SELECT
        );
        let views = sqlx::query_as::<_, AppointmentView>(&sql)
            .bind(professional_id)
            .bind(from)
            .bind(to)
            .fetch_all(executor)
            .await?;
        Ok(views)
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    /// Cria ou atualiza o cliente pela chave (estabelecimento, telefone).
    /// E-mail ausente não apaga o que já estava salvo.
    pub async fn upsert_customer<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (establishment_id, name, phone, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (establishment_id, phone) DO UPDATE
            SET name = EXCLUDED.name,
                email = COALESCE(EXCLUDED.email, customers.email)
            RETURNING id, establishment_id, name, phone, email, created_at
            "#,
        )
        .bind(establishment_id)
        .bind(name)
        .bind(phone)
        .bind(email)
        .fetch_one(executor)
        .await?;
        Ok(customer)
    }

    // =========================================================================
    //  AUDITORIA
    // =========================================================================

    pub async fn insert_event<'e, E>(&self, executor: E, event: &NewEvent) -> Result<AppointmentEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, AppointmentEvent>(
            r#"
            INSERT INTO appointment_events (
                appointment_id, event_type, actor_type, actor_user_id, from_payload, to_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, appointment_id, event_type, actor_type, actor_user_id,
                      from_payload, to_payload, created_at
            "#,
        )
        .bind(event.appointment_id)
        .bind(event.event_type)
        .bind(event.actor_type)
        .bind(event.actor_user_id)
        .bind(event.from_payload.as_ref())
        .bind(event.to_payload.as_ref())
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn list_events<'e, E>(&self, executor: E, appointment_id: Uuid) -> Result<Vec<AppointmentEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let events = sqlx::query_as::<_, AppointmentEvent>(
            r#"
            SELECT id, appointment_id, event_type, actor_type, actor_user_id,
                   from_payload, to_payload, created_at
            FROM appointment_events
            WHERE appointment_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(appointment_id)
        .fetch_all(executor)
        .await?;
        Ok(events)
    }
}
