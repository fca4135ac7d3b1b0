// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        AppointmentRepository, EstablishmentRepository, SubscriptionRepository, TokenRepository,
        UserRepository,
    },
    services::{
        appointment_service::AppointmentService,
        auth::AuthService,
        availability_service::AvailabilityService,
        billing_service::BillingService,
        notifier::{AppointmentNotifier, LogNotifier},
        portal_service::PortalService,
        quota_service::QuotaService,
        token_service::TokenService,
    },
};

/// Configuração do processo, lida uma vez na inicialização.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_max_connections: u32,
    pub manage_token_ttl_days: i64,
    pub portal_session_ttl_hours: i64,
    pub default_plan_code: String,
    /// Sem segredo o webhook de cobrança fica desligado.
    pub billing_webhook_secret: Option<String>,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} deve ser definida", name))
}

fn optional<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} inválida ('{}'): {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: optional("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", 5)?,
            manage_token_ttl_days: optional("MANAGE_TOKEN_TTL_DAYS", 30)?,
            portal_session_ttl_hours: optional("PORTAL_SESSION_TTL_HOURS", 12)?,
            default_plan_code: optional("DEFAULT_PLAN_CODE", "basic".to_string())?,
            billing_webhook_secret: env::var("BILLING_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub i18n_store: Arc<I18nStore>,
    pub auth_service: AuthService,
    pub availability_service: AvailabilityService,
    pub appointment_service: AppointmentService,
    pub quota_service: QuotaService,
    pub portal_service: PortalService,
    pub billing_service: BillingService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Settings::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::from_parts(db_pool, settings, Arc::new(LogNotifier))
    }

    /// Monta o grafo de dependências a partir de um pool já aberto.
    pub fn from_parts(
        db_pool: PgPool,
        settings: Settings,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;

        let user_repo = UserRepository::new(db_pool.clone());
        let establishment_repo = EstablishmentRepository::new(db_pool.clone());
        let appointment_repo = AppointmentRepository::new(db_pool.clone());
        let token_repo = TokenRepository::new(db_pool.clone());
        let subscription_repo = SubscriptionRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, settings.jwt_secret.clone(), db_pool.clone());
        let token_service = TokenService::new(
            token_repo,
            chrono::Duration::days(settings.manage_token_ttl_days),
            chrono::Duration::hours(settings.portal_session_ttl_hours),
        );
        let quota_service = QuotaService::new(
            establishment_repo.clone(),
            appointment_repo.clone(),
            subscription_repo.clone(),
            settings.default_plan_code.clone(),
        );
        let availability_service = AvailabilityService::new(establishment_repo.clone(), appointment_repo.clone());
        let appointment_service = AppointmentService::new(
            establishment_repo.clone(),
            appointment_repo.clone(),
            quota_service.clone(),
            token_service.clone(),
            notifier,
        );
        let portal_service = PortalService::new(establishment_repo, appointment_repo, token_service);
        let billing_service = BillingService::new(subscription_repo, settings.default_plan_code.clone());

        Ok(Self {
            db_pool,
            settings: Arc::new(settings),
            i18n_store: Arc::new(i18n_store),
            auth_service,
            availability_service,
            appointment_service,
            quota_service,
            portal_service,
            billing_service,
        })
    }
}
