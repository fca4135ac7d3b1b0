// src/services/notifier.rs

use async_trait::async_trait;

use crate::models::appointment::{Appointment, AppointmentEvent};

/// Chamado depois que um evento de agendamento é gravado.
/// Falhas aqui não desfazem nada: quem chama só registra o erro.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn notify(&self, appointment: &Appointment, event: &AppointmentEvent) -> anyhow::Result<()>;
}

/// Implementação padrão: só escreve no log.
pub struct LogNotifier;

#[async_trait]
impl AppointmentNotifier for LogNotifier {
    async fn notify(&self, appointment: &Appointment, event: &AppointmentEvent) -> anyhow::Result<()> {
        tracing::info!(
            appointment_id = %appointment.id,
            event = ?event.event_type,
            actor = ?event.actor_type,
            start_at = %appointment.start_at,
            "📣 Evento de agendamento registrado"
        );
        Ok(())
    }
}
