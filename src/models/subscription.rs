// src/models/subscription.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[schema(example = "basic")]
    pub code: String,
    #[schema(example = "Básico")]
    pub name: String,
    // NULL ou negativo = ilimitado
    pub max_professionals: Option<i32>,
    pub max_appointments_month: Option<i32>,
    pub allow_multi_establishments: bool,
}

impl Plan {
    /// Plano usado quando nem a assinatura nem o plano padrão existem no banco.
    pub fn builtin_basic() -> Self {
        Self {
            code: "basic".to_string(),
            name: "Básico".to_string(),
            max_professionals: Some(1),
            max_appointments_month: Some(100),
            allow_multi_establishments: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub plan_code: String,
    #[schema(example = "active")]
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// `past_due` ainda vale até o fim do período pago.
    pub fn grants_plan(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status.as_str(), "active" | "past_due") && self.current_period_end >= now
    }
}

/// Resposta de `canCreateProfessional` / `canCreateAppointment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    #[schema(example = "ok")]
    pub reason: String,
    pub limit: Option<i64>,
    pub usage: i64,
}

impl QuotaDecision {
    /// Compara o uso atual com o limite do plano.
    pub fn evaluate(limit: Option<i32>, usage: i64, what: &str) -> Self {
        match limit.filter(|max| *max >= 0) {
            None => Self {
                allowed: true,
                reason: "unlimited".to_string(),
                limit: None,
                usage,
            },
            Some(max) if usage < i64::from(max) => Self {
                allowed: true,
                reason: "ok".to_string(),
                limit: Some(i64::from(max)),
                usage,
            },
            Some(max) => Self {
                allowed: false,
                reason: format!("Limite de {} {} do plano atingido", max, what),
                limit: Some(i64::from(max)),
                usage,
            },
        }
    }

    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (limit - self.usage).max(0))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUsage {
    pub plan_code: String,
    pub plan_name: String,
    #[schema(example = "active")]
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub max_professionals: Option<i64>,
    pub max_appointments_month: Option<i64>,
    pub allow_multi_establishments: bool,
    pub current_professionals: i64,
    pub current_appointments_month: i64,
    pub can_add_professional: bool,
    pub can_add_appointment: bool,
    pub professionals_remaining: Option<i64>,
    pub appointments_remaining: Option<i64>,
}

/// Evento de cobrança já traduzido pelo integrador de pagamentos.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusEvent {
    #[schema(example = "ord_123")]
    pub event_id: String,
    pub owner_user_id: Uuid,
    pub plan_code: Option<String>,
    #[schema(example = "active")]
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unlimited_plans_always_allow() {
        for limit in [None, Some(-1)] {
            let decision = QuotaDecision::evaluate(limit, 10_000, "profissionais");
            assert!(decision.allowed);
            assert_eq!(decision.limit, None);
            assert_eq!(decision.remaining(), None);
        }
    }

    #[test]
    fn limit_is_reached_when_usage_equals_max() {
        let below = QuotaDecision::evaluate(Some(100), 99, "agendamentos");
        assert!(below.allowed);
        assert_eq!(below.remaining(), Some(1));

        let at = QuotaDecision::evaluate(Some(100), 100, "agendamentos");
        assert!(!at.allowed);
        assert_eq!(at.limit, Some(100));
        assert_eq!(at.usage, 100);
        assert_eq!(at.remaining(), Some(0));
    }

    #[test]
    fn past_due_subscriptions_keep_the_plan_until_period_end() {
        let now = Utc::now();
        let mut sub = Subscription {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            plan_code: "pro".into(),
            status: "past_due".into(),
            current_period_start: now - Duration::days(20),
            current_period_end: now + Duration::days(10),
            updated_at: now,
        };
        assert!(sub.grants_plan(now));

        sub.current_period_end = now - Duration::seconds(1);
        assert!(!sub.grants_plan(now));

        sub.current_period_end = now + Duration::days(10);
        sub.status = "canceled".into();
        assert!(!sub.grants_plan(now));
    }
}
