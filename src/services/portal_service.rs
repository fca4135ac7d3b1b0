// src/services/portal_service.rs
//
// Portal do profissional: login por slug + senha e leitura da própria agenda.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Acquire, PgConnection, Postgres};

use crate::{
    common::error::AppError,
    db::{token_repo::PortalSessionRow, AppointmentRepository, EstablishmentRepository},
    models::{appointment::AppointmentView, portal::PortalSession},
    services::{
        auth::verify_password,
        token_service::{hash_token, TokenService},
    },
};

/// Maior intervalo que o portal lista de uma vez.
const MAX_AGENDA_DAYS: i64 = 62;

#[derive(Clone)]
pub struct PortalService {
    establishments: EstablishmentRepository,
    appointments: AppointmentRepository,
    tokens: TokenService,
}

impl PortalService {
    pub fn new(establishments: EstablishmentRepository, appointments: AppointmentRepository, tokens: TokenService) -> Self {
        Self {
            establishments,
            appointments,
            tokens,
        }
    }

    /// Qualquer falha vira `InvalidCredentials`, para não revelar o que existe.
    pub async fn login<'e, E>(
        &self,
        executor: E,
        establishment_slug: &str,
        professional_slug: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<PortalSession, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let establishment = self
            .establishments
            .find_by_slug(&mut *tx, establishment_slug)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let professional = self
            .establishments
            .find_professional_by_slug(&mut *tx, establishment.id, professional_slug)
            .await?
            .filter(|p| p.active && p.portal_enabled)
            .ok_or(AppError::InvalidCredentials)?;
        let password_hash = professional
            .portal_password_hash
            .as_deref()
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let removed = self
            .tokens
            .repo()
            .delete_expired_portal_sessions(&mut *tx, professional.id)
            .await?;
        let session = self.tokens.open_portal_session(&mut *tx, professional.id, now).await?;
        self.establishments.touch_portal_login(&mut *tx, professional.id).await?;

        tx.commit().await?;

        tracing::info!(
            professional_id = %professional.id,
            expired_sessions_removed = removed,
            "🔓 Login no portal do profissional"
        );

        Ok(PortalSession {
            token: session.raw,
            expires_at: session.expires_at,
            professional_id: professional.id,
            professional_name: professional.name,
        })
    }

    pub async fn authenticate(
        &self,
        conn: &mut PgConnection,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<PortalSessionRow, AppError> {
        let session = self
            .tokens
            .repo()
            .find_portal_session(&mut *conn, &hash_token(raw_token))
            .await?;
        check_portal_session(session, now)
    }

    pub async fn list_appointments<'e, E>(
        &self,
        executor: E,
        raw_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentView>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        if to <= from || to - from > Duration::days(MAX_AGENDA_DAYS) {
            return Err(AppError::InvalidInput(format!(
                "intervalo deve ser positivo e ter no máximo {} dias",
                MAX_AGENDA_DAYS
            )));
        }

        let mut conn = executor.acquire().await?;
        let session = self.authenticate(&mut *conn, raw_token, now).await?;
        self.appointments
            .list_views_for_professional(&mut *conn, session.professional_id, from, to)
            .await
    }
}

/// Sessão ausente ou vencida é sempre `InvalidToken`.
fn check_portal_session(session: Option<PortalSessionRow>, now: DateTime<Utc>) -> Result<PortalSessionRow, AppError> {
    match session {
        Some(session) if session.expires_at > now => Ok(session),
        _ => Err(AppError::InvalidToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn session(expires_at: DateTime<Utc>) -> PortalSessionRow {
        PortalSessionRow {
            professional_id: Uuid::new_v4(),
            establishment_id: Uuid::new_v4(),
            expires_at,
        }
    }

    #[test]
    fn portal_session_must_be_present_and_unexpired() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

        let live = session(now + Duration::minutes(1));
        let id = live.professional_id;
        assert_eq!(check_portal_session(Some(live), now).unwrap().professional_id, id);

        assert!(matches!(check_portal_session(None, now), Err(AppError::InvalidToken)));
        assert!(matches!(check_portal_session(Some(session(now)), now), Err(AppError::InvalidToken)));
        assert!(matches!(
            check_portal_session(Some(session(now - Duration::hours(1))), now),
            Err(AppError::InvalidToken)
        ));
    }
}
