// src/db/token_repo.rs
//
// Só hashes passam por aqui. O token cru nunca chega ao banco.

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::appointment::ManageTokenRow};

/// Sessão do portal do profissional.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortalSessionRow {
    pub professional_id: Uuid,
    pub establishment_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  TOKENS DE GERENCIAMENTO
    // =========================================================================

    /// Um token por agendamento: reemitir substitui o anterior.
    pub async fn upsert_manage_token<'e, E>(
        &self,
        executor: E,
        appointment_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ManageTokenRow, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ManageTokenRow>(
            r#"
            INSERT INTO appointment_manage_tokens (appointment_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (appointment_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                used_at = NULL,
                created_at = NOW()
            RETURNING id, appointment_id, token_hash, expires_at, used_at
            "#,
        )
        .bind(appointment_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn find_manage_token<'e, E>(&self, executor: E, token_hash: &str) -> Result<Option<ManageTokenRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ManageTokenRow>(
            r#"
            SELECT id, appointment_id, token_hash, expires_at, used_at
            FROM appointment_manage_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn mark_manage_token_used<'e, E>(&self, executor: E, token_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE appointment_manage_tokens SET used_at = NOW() WHERE id = $1 AND used_at IS NULL")
            .bind(token_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  SESSÕES DO PORTAL
    // =========================================================================

    pub async fn insert_portal_session<'e, E>(
        &self,
        executor: E,
        professional_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO professional_portal_sessions (professional_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(professional_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Sessão pelo hash, já com o estabelecimento do profissional.
    /// Profissional desativado ou com portal desligado não tem sessão válida.
    pub async fn find_portal_session<'e, E>(&self, executor: E, token_hash: &str) -> Result<Option<PortalSessionRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PortalSessionRow>(
            r#"
            SELECT s.professional_id, p.establishment_id, s.expires_at
            FROM professional_portal_sessions s
            JOIN professionals p ON p.id = s.professional_id
            WHERE s.token_hash = $1 AND p.active AND p.portal_enabled
            "#,
        )
        .bind(token_hash)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Limpa as sessões vencidas do profissional ao abrir uma nova.
    pub async fn delete_expired_portal_sessions<'e, E>(&self, executor: E, professional_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM professional_portal_sessions WHERE professional_id = $1 AND expires_at < NOW()",
        )
        .bind(professional_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
