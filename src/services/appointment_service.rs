// src/services/appointment_service.rs
//
// Única porta de escrita em `appointments`. Cada operação roda numa transação:
// trava a linha do profissional, relê a agenda e só então grava.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{AppError, PolicyViolation},
    db::{
        appointment_repo::{NewAppointment, NewEvent},
        AppointmentRepository, EstablishmentRepository,
    },
    models::{
        appointment::{
            Actor, Appointment, AppointmentEvent, AppointmentEventType, AppointmentStatus,
            CustomerInput, ManageAppointmentView, StatusAction, normalize_phone,
        },
        establishment::{BookingSettings, Establishment, Professional, Service},
    },
    scheduling::{
        policy::{ensure_lead_time, ensure_within_booking_window},
        slots, LocalDay,
    },
    services::{
        availability_service::{end_for, load_calendar_rules, occupied_ranges, slot_request},
        notifier::AppointmentNotifier,
        quota_service::QuotaService,
        token_service::{IssuedToken, TokenService},
    },
};

/// Pedido de agendamento vindo da página pública.
#[derive(Debug, Clone)]
pub struct CreateAppointmentCommand {
    pub slug: String,
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub start_at: DateTime<Utc>,
    /// Opcional; quando vem, precisa bater com a duração do serviço.
    pub end_at: Option<DateTime<Utc>>,
    pub customer: CustomerInput,
    pub policy_accepted: bool,
}

#[derive(Debug, Clone)]
pub struct CreatedAppointment {
    pub appointment: Appointment,
    /// `None` quando a emissão falhou; a equipe pode reemitir depois.
    pub manage_token: Option<IssuedToken>,
}

#[derive(Debug, Clone)]
pub struct RescheduleCommand {
    pub start_at: DateTime<Utc>,
    pub professional_id: Option<Uuid>,
}

/// Como o agendamento foi alcançado: por um membro da equipe ou por um link.
#[derive(Debug, Clone, Copy)]
pub enum AppointmentTarget<'a> {
    Member {
        establishment_id: Uuid,
        appointment_id: Uuid,
        actor: Actor,
    },
    Token(&'a str),
}

/// Agendamento travado e o contexto de quem pediu.
struct Resolved {
    appointment: Appointment,
    establishment: Establishment,
    settings: BookingSettings,
    actor: Actor,
    token_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct AppointmentService {
    establishments: EstablishmentRepository,
    appointments: AppointmentRepository,
    quota: QuotaService,
    tokens: TokenService,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl AppointmentService {
    pub fn new(
        establishments: EstablishmentRepository,
        appointments: AppointmentRepository,
        quota: QuotaService,
        tokens: TokenService,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            establishments,
            appointments,
            quota,
            tokens,
            notifier,
        }
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        cmd: CreateAppointmentCommand,
        now: DateTime<Utc>,
    ) -> Result<CreatedAppointment, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        cmd.customer.validate()?;

        let mut tx = executor.begin().await?;

        // 1. Estabelecimento
        let establishment = self
            .establishments
            .find_by_slug(&mut *tx, &cmd.slug)
            .await?
            .ok_or(AppError::EstablishmentNotFound)?;
        if !establishment.booking_enabled {
            return Err(AppError::policy(PolicyViolation::BookingDisabled));
        }
        let settings = establishment.booking_settings()?;

        // 2. Serviço
        let service = self
            .establishments
            .find_service(&mut *tx, establishment.id, cmd.service_id)
            .await?
            .ok_or(AppError::ServiceNotFound)?;
        if !service.active {
            return Err(AppError::policy(PolicyViolation::ServiceInactive));
        }

        // 3. Profissional (travado até o commit)
        let professional = self
            .lock_bookable_professional(&mut tx, &establishment, &service, cmd.professional_id)
            .await?;

        // 4. Regras do formulário e da janela de reserva
        if establishment.require_policy_acceptance && !cmd.policy_accepted {
            return Err(AppError::policy(PolicyViolation::PolicyAcceptanceRequired));
        }
        let end_at = end_for(cmd.start_at, &service);
        if cmd.end_at.is_some_and(|end| end != end_at) {
            return Err(AppError::InvalidInput(format!(
                "endAt deve ser {} para um serviço de {} minutos",
                end_at.to_rfc3339(),
                service.duration_minutes
            )));
        }
        ensure_within_booking_window(cmd.start_at, now, &settings)?;

        // 5. Cota do plano
        self.quota.ensure_can_create_appointment(&mut tx, &establishment, now).await?;

        // 6. Agenda, relida sob a trava
        self.ensure_slot_free(&mut tx, &settings, &service, &professional, cmd.start_at, end_at, None)
            .await?;

        // 7. Gravação
        let CustomerInput { name, phone, email, notes } = cmd.customer;
        let email = email.filter(|_| establishment.ask_email).filter(|e| !e.trim().is_empty());
        let notes = notes.filter(|_| establishment.ask_notes).filter(|n| !n.trim().is_empty());

        let customer = self
            .appointments
            .upsert_customer(
                &mut *tx,
                establishment.id,
                name.trim(),
                &normalize_phone(&phone),
                email.as_deref().map(str::trim),
            )
            .await?;

        let status = if establishment.auto_confirm_bookings {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Booked
        };

        let appointment = self
            .appointments
            .insert(
                &mut *tx,
                &NewAppointment {
                    establishment_id: establishment.id,
                    professional_id: professional.id,
                    service_id: service.id,
                    customer_id: customer.id,
                    start_at: cmd.start_at,
                    end_at,
                    status,
                    customer_notes: notes,
                },
            )
            .await?;

        let event = self
            .appointments
            .insert_event(
                &mut *tx,
                &NewEvent {
                    appointment_id: appointment.id,
                    event_type: AppointmentEventType::Created,
                    actor_type: Actor::customer().kind,
                    actor_user_id: None,
                    from_payload: None,
                    to_payload: Some(appointment.snapshot()),
                },
            )
            .await?;

        // 8. Token num savepoint: se falhar, o agendamento segue sem ele
        let manage_token = {
            let mut savepoint = (&mut *tx).begin().await?;
            match self.tokens.issue(&mut *savepoint, appointment.id, now).await {
                Ok(token) => {
                    savepoint.commit().await?;
                    Some(token)
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    tracing::warn!(
                        appointment_id = %appointment.id,
                        error = %err,
                        "⚠️ Falha ao emitir token de gerenciamento; agendamento mantido sem token"
                    );
                    None
                }
            }
        };

        tx.commit().await?;

        tracing::info!(
            appointment_id = %appointment.id,
            establishment = %establishment.slug,
            professional_id = %professional.id,
            status = ?appointment.status,
            "✅ Agendamento criado"
        );
        self.notify(&appointment, &event).await;

        Ok(CreatedAppointment {
            appointment,
            manage_token,
        })
    }

    // =========================================================================
    //  REMARCAÇÃO
    // =========================================================================

    pub async fn reschedule<'e, E>(
        &self,
        executor: E,
        target: AppointmentTarget<'_>,
        cmd: RescheduleCommand,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let Resolved {
            appointment: current,
            settings,
            actor,
            establishment,
            ..
        } = self.resolve(&mut tx, target, now).await?;

        current.status.apply(StatusAction::Reschedule)?;
        ensure_lead_time(&actor, current.start_at, now, &settings)?;
        ensure_within_booking_window(cmd.start_at, now, &settings)?;

        let professional_id = cmd.professional_id.unwrap_or(current.professional_id);
        let professional_changed = professional_id != current.professional_id;

        let service = self
            .establishments
            .find_service(&mut *tx, establishment.id, current.service_id)
            .await?
            .ok_or(AppError::ServiceNotFound)?;

        let professional = if professional_changed {
            self.lock_bookable_professional(&mut tx, &establishment, &service, professional_id)
                .await?
        } else {
            let professional = self
                .establishments
                .lock_professional(&mut *tx, establishment.id, professional_id)
                .await?
                .ok_or(AppError::ProfessionalNotFound)?;
            if !professional.active {
                return Err(AppError::policy(PolicyViolation::ProfessionalInactive));
            }
            professional
        };

        // A duração original vale mesmo que o serviço tenha mudado depois
        let end_at = cmd.start_at + Duration::minutes(current.duration_minutes());

        if !professional_changed && cmd.start_at == current.start_at {
            tx.commit().await?;
            return Ok(current);
        }

        self.ensure_slot_free(
            &mut tx,
            &settings,
            &service,
            &professional,
            cmd.start_at,
            end_at,
            Some(current.id),
        )
        .await?;

        let updated = self
            .appointments
            .update_schedule(&mut *tx, current.id, professional.id, cmd.start_at, end_at)
            .await?;

        let event_type = if professional_changed && cmd.start_at == current.start_at {
            AppointmentEventType::ProfessionalChanged
        } else {
            AppointmentEventType::Rescheduled
        };
        let event = self
            .appointments
            .insert_event(
                &mut *tx,
                &NewEvent {
                    appointment_id: updated.id,
                    event_type,
                    actor_type: actor.kind,
                    actor_user_id: actor.user_id,
                    from_payload: Some(current.snapshot()),
                    to_payload: Some(updated.snapshot()),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            appointment_id = %updated.id,
            actor = ?actor.kind,
            event = ?event_type,
            "🔁 Agendamento remarcado"
        );
        self.notify(&updated, &event).await;

        Ok(updated)
    }

    // =========================================================================
    //  CANCELAMENTO E STATUS
    // =========================================================================

    /// Cliente cancela respeitando a antecedência; equipe a qualquer momento.
    /// Pelo link, o cancelamento consome o token.
    pub async fn cancel<'e, E>(
        &self,
        executor: E,
        target: AppointmentTarget<'_>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let resolved = self.resolve(&mut tx, target, now).await?;

        let next = resolved.appointment.status.apply(StatusAction::Cancel)?;
        ensure_lead_time(&resolved.actor, resolved.appointment.start_at, now, &resolved.settings)?;

        let (updated, event) = self
            .transition(&mut tx, &resolved.appointment, next, StatusAction::Cancel, &resolved.actor)
            .await?;

        if let Some(token_id) = resolved.token_id {
            self.tokens.consume(&mut *tx, token_id).await?;
        }

        tx.commit().await?;

        tracing::info!(appointment_id = %updated.id, actor = ?resolved.actor.kind, "❌ Agendamento cancelado");
        self.notify(&updated, &event).await;

        Ok(updated)
    }

    /// Confirmar, concluir ou marcar falta. Só a equipe.
    pub async fn change_status<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        appointment_id: Uuid,
        action: StatusAction,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        if !matches!(action, StatusAction::Confirm | StatusAction::Complete | StatusAction::NoShow) {
            return Err(AppError::InvalidInput(format!("ação '{}' não é uma mudança de status", action.name())));
        }

        let mut tx = executor.begin().await?;
        let target = AppointmentTarget::Member {
            establishment_id,
            appointment_id,
            actor,
        };
        let resolved = self.resolve(&mut tx, target, now).await?;
        let next = resolved.appointment.status.apply(action)?;

        let (updated, event) = self
            .transition(&mut tx, &resolved.appointment, next, action, &actor)
            .await?;

        tx.commit().await?;

        tracing::info!(appointment_id = %updated.id, status = ?updated.status, actor = ?actor.kind, "Status do agendamento alterado");
        self.notify(&updated, &event).await;

        Ok(updated)
    }

    // =========================================================================
    //  TOKEN E CONSULTAS
    // =========================================================================

    /// Caminho da equipe para recuperar (ou trocar) o link do cliente.
    pub async fn reissue_manage_token<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let appointment = self.find_in_establishment(&mut tx, establishment_id, appointment_id).await?;
        let token = self.tokens.issue(&mut *tx, appointment.id, now).await?;
        tx.commit().await?;

        tracing::info!(appointment_id = %appointment.id, "🔑 Token de gerenciamento reemitido");
        Ok(token)
    }

    pub async fn view_by_token<'e, E>(&self, executor: E, raw_token: &str, now: DateTime<Utc>) -> Result<ManageAppointmentView, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        let token = self.tokens.validate(&mut *conn, raw_token, now).await?;

        // Token órfão se comporta como token inválido
        let view = self
            .appointments
            .find_view(&mut *conn, token.appointment_id)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        let establishment = self
            .establishments
            .find_by_id(&mut *conn, view.establishment_id)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        let settings = establishment.booking_settings()?;

        let can_self_manage = view.status.is_active()
            && ensure_lead_time(&Actor::customer(), view.start_at, now, &settings).is_ok();

        Ok(ManageAppointmentView {
            appointment: view,
            can_self_manage,
            reschedule_min_hours: settings.reschedule_min_hours,
            cancellation_policy_text: establishment.cancellation_policy_text,
            token_expires_at: token.expires_at,
        })
    }

    pub async fn list_events<'e, E>(
        &self,
        executor: E,
        establishment_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AppointmentEvent>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        let appointment = self.find_in_establishment(&mut conn, establishment_id, appointment_id).await?;
        self.appointments.list_events(&mut *conn, appointment.id).await
    }

    // =========================================================================
    //  AUXILIARES
    // =========================================================================

    async fn find_in_establishment(
        &self,
        conn: &mut PgConnection,
        establishment_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppError> {
        self.appointments
            .find_by_id(&mut *conn, appointment_id)
            .await?
            .filter(|a| a.establishment_id == establishment_id)
            .ok_or(AppError::AppointmentNotFound)
    }

    /// Trava o agendamento e descobre quem está agindo.
    async fn resolve(
        &self,
        conn: &mut PgConnection,
        target: AppointmentTarget<'_>,
        now: DateTime<Utc>,
    ) -> Result<Resolved, AppError> {
        let (appointment, actor, token_id) = match target {
            AppointmentTarget::Member {
                establishment_id,
                appointment_id,
                actor,
            } => {
                let appointment = self
                    .appointments
                    .lock(&mut *conn, appointment_id)
                    .await?
                    .filter(|a| a.establishment_id == establishment_id)
                    .ok_or(AppError::AppointmentNotFound)?;
                (appointment, actor, None)
            }
            AppointmentTarget::Token(raw) => {
                let token = self.tokens.validate(&mut *conn, raw, now).await?;
                let appointment = self
                    .appointments
                    .lock(&mut *conn, token.appointment_id)
                    .await?
                    .ok_or(AppError::TokenInvalid)?;
                (appointment, Actor::customer(), Some(token.id))
            }
        };

        let establishment = self
            .establishments
            .find_by_id(&mut *conn, appointment.establishment_id)
            .await?
            .ok_or(AppError::EstablishmentNotFound)?;
        let settings = establishment.booking_settings()?;

        Ok(Resolved {
            appointment,
            establishment,
            settings,
            actor,
            token_id,
        })
    }

    /// Profissional ativo, do estabelecimento, que faz o serviço. Fica travado.
    async fn lock_bookable_professional(
        &self,
        conn: &mut PgConnection,
        establishment: &Establishment,
        service: &Service,
        professional_id: Uuid,
    ) -> Result<Professional, AppError> {
        let professional = self
            .establishments
            .lock_professional(&mut *conn, establishment.id, professional_id)
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
        Ok(professional)
    }

    /// Mesma conta da disponibilidade: cabe no horário aberto e há lugar.
    #[allow(clippy::too_many_arguments)]
    async fn ensure_slot_free(
        &self,
        conn: &mut PgConnection,
        settings: &BookingSettings,
        service: &Service,
        professional: &Professional,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let (day, _) = LocalDay::containing(start_at, settings.timezone);
        let (from, to) = day.query_window();
        let ids = [professional.id];

        let rules = load_calendar_rules(
            &self.establishments,
            conn,
            professional.establishment_id,
            &ids,
            from,
            to,
        )
        .await?;
        let existing = self
            .appointments
            .list_active_in_range(&mut *conn, &ids, from, to, exclude)
            .await?;

        let open = rules.open_intervals(professional.id, &day);
        let occupied = occupied_ranges(&existing, professional.id, &day);
        let request = slot_request(settings, service, professional);

        let candidate = day.range_of(start_at, end_at);
        let free = slots::fits(&open, candidate)
            && slots::has_capacity(&occupied, candidate, request.buffer_minutes, request.capacity);

        if !free {
            tracing::info!(
                professional_id = %professional.id,
                start_at = %start_at,
                "Horário indisponível no momento da gravação"
            );
            return Err(AppError::SlotNoLongerAvailable);
        }
        Ok(())
    }

    async fn transition(
        &self,
        conn: &mut PgConnection,
        current: &Appointment,
        next: AppointmentStatus,
        action: StatusAction,
        actor: &Actor,
    ) -> Result<(Appointment, AppointmentEvent), AppError> {
        let updated = self.appointments.update_status(&mut *conn, current.id, next).await?;
        let event = self
            .appointments
            .insert_event(
                &mut *conn,
                &NewEvent {
                    appointment_id: updated.id,
                    event_type: action.event_type(),
                    actor_type: actor.kind,
                    actor_user_id: actor.user_id,
                    from_payload: Some(current.snapshot()),
                    to_payload: Some(updated.snapshot()),
                },
            )
            .await?;
        Ok((updated, event))
    }

    async fn notify(&self, appointment: &Appointment, event: &AppointmentEvent) {
        if let Err(err) = self.notifier.notify(appointment, event).await {
            tracing::warn!(
                appointment_id = %appointment.id,
                error = %err,
                "⚠️ Falha ao notificar evento de agendamento"
            );
        }
    }
}
