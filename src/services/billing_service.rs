// src/services/billing_service.rs
//
// Efeito dos eventos de cobrança sobre a assinatura. Nada de pagamento aqui.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Acquire, Postgres};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::SubscriptionRepository,
    models::subscription::SubscriptionStatusEvent,
};

const SUBSCRIPTION_STATUSES: [&str; 3] = ["active", "past_due", "canceled"];
const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingOutcome {
    Applied,
    /// Mesmo `eventId` já processado: nada muda.
    Duplicate,
}

#[derive(Clone)]
pub struct BillingService {
    repo: SubscriptionRepository,
    default_plan_code: String,
}

impl BillingService {
    pub fn new(repo: SubscriptionRepository, default_plan_code: String) -> Self {
        Self { repo, default_plan_code }
    }

    pub async fn apply_subscription_event<'e, E>(
        &self,
        executor: E,
        event: &SubscriptionStatusEvent,
        now: DateTime<Utc>,
    ) -> Result<BillingOutcome, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        if !SUBSCRIPTION_STATUSES.contains(&event.status.as_str()) {
            return Err(AppError::InvalidInput(format!("status de assinatura desconhecido: {}", event.status)));
        }

        let mut tx = executor.begin().await?;

        let payload = serde_json::to_value(event).map_err(anyhow::Error::from)?;
        let first_time = self
            .repo
            .record_billing_event(&mut *tx, &event.event_id, "subscription.status", &payload)
            .await?;
        if !first_time {
            tx.commit().await?;
            tracing::info!(event_id = %event.event_id, "Evento de cobrança repetido ignorado");
            return Ok(BillingOutcome::Duplicate);
        }

        let current = self.repo.find_by_owner(&mut *tx, event.owner_user_id).await?;

        let plan_code = event
            .plan_code
            .clone()
            .or_else(|| current.as_ref().map(|s| s.plan_code.clone()))
            .unwrap_or_else(|| self.default_plan_code.clone());
        if self.repo.find_plan(&mut *tx, &plan_code).await?.is_none() {
            return Err(AppError::InvalidInput(format!("plano desconhecido: {}", plan_code)));
        }

        let period_end = event
            .current_period_end
            .or_else(|| current.as_ref().map(|s| s.current_period_end))
            .unwrap_or_else(|| match event.status.as_str() {
                "canceled" => now,
                _ => now + Duration::days(DEFAULT_PERIOD_DAYS),
            });

        let subscription = self
            .repo
            .upsert_subscription(&mut *tx, event.owner_user_id, &plan_code, &event.status, period_end)
            .await?;
        self.repo.mark_billing_event_processed(&mut *tx, &event.event_id).await?;

        tx.commit().await?;

        tracing::info!(
            event_id = %event.event_id,
            owner_user_id = %subscription.owner_user_id,
            plan_code = %subscription.plan_code,
            status = %subscription.status,
            "💳 Assinatura atualizada"
        );
        Ok(BillingOutcome::Applied)
    }
}
