// src/lib.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod scheduling;
pub mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::{auth_guard, tenant_guard};

/// Monta o roteador completo da API.
pub fn app(app_state: AppState) -> Router {
    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas de usuário (só JWT)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Página pública e link do cliente
    let public_routes = Router::new()
        .route("/{slug}/availability", get(handlers::public_booking::get_availability))
        .route("/{slug}/appointments", post(handlers::public_booking::create_appointment))
        .route("/manage/{token}", get(handlers::manage::view_appointment))
        .route("/manage/{token}/reschedule", post(handlers::manage::reschedule_appointment))
        .route("/manage/{token}/cancel", post(handlers::manage::cancel_appointment));

    // Painel: JWT + x-establishment-id + vínculo
    let appointment_routes = Router::new()
        .route("/{id}/reschedule", post(handlers::appointments::reschedule))
        .route("/{id}/cancel", post(handlers::appointments::cancel))
        .route("/{id}/confirm", post(handlers::appointments::confirm))
        .route("/{id}/complete", post(handlers::appointments::complete))
        .route("/{id}/no-show", post(handlers::appointments::no_show))
        .route("/{id}/manage-token", post(handlers::appointments::reissue_manage_token))
        .route("/{id}/events", get(handlers::appointments::list_events))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    let subscription_routes = Router::new()
        .route("/usage", get(handlers::subscription::get_usage))
        .route("/can-create-professional", get(handlers::subscription::can_create_professional))
        .route("/can-create-appointment", get(handlers::subscription::can_create_appointment))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    // O portal valida a própria sessão dentro do handler
    let portal_routes = Router::new()
        .route("/login", post(handlers::portal::login))
        .route("/appointments", get(handlers::portal::list_appointments));

    let billing_routes = Router::new()
        .route("/subscription-events", post(handlers::billing::subscription_event));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/public", public_routes)
        .nest("/api/appointments", appointment_routes)
        .nest("/api/subscription", subscription_routes)
        .nest("/api/portal", portal_routes)
        .nest("/api/billing", billing_routes)
        .with_state(app_state)
}
