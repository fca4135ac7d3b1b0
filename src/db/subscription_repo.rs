// src/db/subscription_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{Plan, Subscription},
};

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_plan<'e, E>(&self, executor: E, code: &str) -> Result<Option<Plan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT code, name, max_professionals, max_appointments_month, allow_multi_establishments
            FROM plans
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(executor)
        .await?;
        Ok(plan)
    }

    pub async fn find_by_owner<'e, E>(&self, executor: E, owner_user_id: Uuid) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, owner_user_id, plan_code, status, current_period_start, current_period_end, updated_at
            FROM subscriptions
            WHERE owner_user_id = $1
            "#,
        )
        .bind(owner_user_id)
        .fetch_optional(executor)
        .await?;
        Ok(subscription)
    }

    /// Grava o estado informado pelo integrador de cobrança.
    /// Sem `plan_code` o plano atual é mantido.
    pub async fn upsert_subscription<'e, E>(
        &self,
        executor: E,
        owner_user_id: Uuid,
        plan_code: &str,
        status: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (owner_user_id, plan_code, status, current_period_end)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner_user_id) DO UPDATE
            SET plan_code = EXCLUDED.plan_code,
                status = EXCLUDED.status,
                current_period_start = CASE
                    WHEN subscriptions.current_period_end < EXCLUDED.current_period_end
                    THEN NOW() ELSE subscriptions.current_period_start END,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = NOW()
            RETURNING id, owner_user_id, plan_code, status, current_period_start, current_period_end, updated_at
            "#,
        )
        .bind(owner_user_id)
        .bind(plan_code)
        .bind(status)
        .bind(current_period_end)
        .fetch_one(executor)
        .await?;
        Ok(subscription)
    }

    /// Registra o evento. `false` quando o mesmo `event_id` já tinha chegado.
    pub async fn record_billing_event<'e, E>(
        &self,
        executor: E,
        event_id: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO billing_webhook_events (event_id, event_type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_billing_event_processed<'e, E>(&self, executor: E, event_id: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE billing_webhook_events SET processed_at = NOW() WHERE event_id = $1")
            .bind(event_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
