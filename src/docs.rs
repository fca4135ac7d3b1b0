// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Public Booking ---
        handlers::public_booking::get_availability,
        handlers::public_booking::create_appointment,

        // --- Manage Link ---
        handlers::manage::view_appointment,
        handlers::manage::reschedule_appointment,
        handlers::manage::cancel_appointment,

        // --- Appointments (painel) ---
        handlers::appointments::reschedule,
        handlers::appointments::cancel,
        handlers::appointments::confirm,
        handlers::appointments::complete,
        handlers::appointments::no_show,
        handlers::appointments::reissue_manage_token,
        handlers::appointments::list_events,

        // --- Subscription ---
        handlers::subscription::get_usage,
        handlers::subscription::can_create_professional,
        handlers::subscription::can_create_appointment,

        // --- Portal ---
        handlers::portal::login,
        handlers::portal::list_appointments,

        // --- Billing ---
        handlers::billing::subscription_event,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::MemberRole,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Availability ---
            models::availability::Availability,
            models::availability::AvailabilityDay,
            models::availability::AvailableSlot,
            models::availability::NotBookableReason,

            // --- Appointments ---
            models::appointment::AppointmentStatus,
            models::appointment::AppointmentEventType,
            models::appointment::ActorType,
            models::appointment::Appointment,
            models::appointment::AppointmentEvent,
            models::appointment::AppointmentView,
            models::appointment::ManageAppointmentView,
            models::appointment::CustomerInput,

            // --- Subscription ---
            models::subscription::Plan,
            models::subscription::QuotaDecision,
            models::subscription::SubscriptionUsage,
            models::subscription::SubscriptionStatusEvent,
            services::billing_service::BillingOutcome,

            // --- Portal ---
            models::portal::PortalLoginPayload,
            models::portal::PortalSession,

            // --- Payloads ---
            handlers::public_booking::CreateAppointmentPayload,
            handlers::public_booking::CreateAppointmentResponse,
            handlers::manage::ReschedulePayload,
            handlers::appointments::ManageTokenResponse,
            handlers::billing::BillingEventResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Public Booking", description = "Página pública: horários livres e agendamento"),
        (name = "Manage Link", description = "Link do cliente para ver, remarcar ou cancelar"),
        (name = "Appointments", description = "Ações da equipe sobre os agendamentos"),
        (name = "Subscription", description = "Plano, limites e uso"),
        (name = "Professional Portal", description = "Agenda do profissional"),
        (name = "Billing", description = "Eventos do integrador de pagamentos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        // Token opaco do portal, também enviado como Bearer
        components.add_security_scheme(
            "portal_session",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/public/{slug}/availability",
            "/api/public/{slug}/appointments",
            "/api/public/manage/{token}/cancel",
            "/api/appointments/{id}/no-show",
            "/api/subscription/usage",
            "/api/portal/appointments",
            "/api/billing/subscription-events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{}", path);
        }
    }
}
