// src/services/token_service.rs
//
// Tokens opacos: 32 bytes aleatórios em hex para o cliente, SHA-256 em hex
// para o banco. A busca é sempre pelo hash.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::TokenRepository,
    models::appointment::ManageTokenRow,
};

/// Token cru com 256 bits de entropia.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Valor guardado no banco no lugar do token.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Decide se a linha encontrada ainda dá acesso.
pub fn check_manage_token(row: Option<ManageTokenRow>, now: DateTime<Utc>) -> Result<ManageTokenRow, AppError> {
    let row = row.ok_or(AppError::TokenInvalid)?;
    if row.used_at.is_some() {
        return Err(AppError::TokenInvalid);
    }
    if row.expires_at <= now {
        return Err(AppError::TokenExpired);
    }
    Ok(row)
}

/// Token recém-emitido. `raw` só existe aqui e na resposta ao cliente.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    repo: TokenRepository,
    manage_ttl: Duration,
    portal_ttl: Duration,
}

impl TokenService {
    pub fn new(repo: TokenRepository, manage_ttl: Duration, portal_ttl: Duration) -> Self {
        Self { repo, manage_ttl, portal_ttl }
    }

    /// Emite (ou substitui) o token do agendamento.
    pub async fn issue<'e, E>(&self, executor: E, appointment_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let raw = generate_token();
        let expires_at = now + self.manage_ttl;
        self.repo
            .upsert_manage_token(executor, appointment_id, &hash_token(&raw), expires_at)
            .await?;
        Ok(IssuedToken { raw, expires_at })
    }

    pub async fn validate<'e, E>(&self, executor: E, raw: &str, now: DateTime<Utc>) -> Result<ManageTokenRow, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = self.repo.find_manage_token(executor, &hash_token(raw)).await?;
        check_manage_token(row, now)
    }

    pub async fn consume<'e, E>(&self, executor: E, token_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.mark_manage_token_used(executor, token_id).await
    }

    // --- Portal ---

    pub async fn open_portal_session<'e, E>(
        &self,
        executor: E,
        professional_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let raw = generate_token();
        let expires_at = now + self.portal_ttl;
        self.repo
            .insert_portal_session(executor, professional_id, &hash_token(&raw), expires_at)
            .await?;
        Ok(IssuedToken { raw, expires_at })
    }

    pub fn repo(&self) -> &TokenRepository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(expires_at: DateTime<Utc>, used_at: Option<DateTime<Utc>>) -> ManageTokenRow {
        ManageTokenRow {
            id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            token_hash: hash_token("abc"),
            expires_at,
            used_at,
        }
    }

    #[test]
    fn tokens_are_256_bit_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn stored_hash_never_equals_the_token() {
        let raw = generate_token();
        let hashed = hash_token(&raw);
        assert_ne!(hashed, raw);
        assert_eq!(hashed, hash_token(&raw));
    }

    #[test]
    fn one_character_difference_changes_the_hash() {
        let raw = generate_token();
        let mut tampered = raw.clone();
        let last = if raw.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(raw.len() - 1.., last);
        assert_ne!(hash_token(&raw), hash_token(&tampered));
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_token() {
        let raw = generate_token();
        assert_ne!(hash_token(&raw), hash_token(&format!("{} ", raw)));
        assert_ne!(hash_token(&raw), hash_token(&format!(" {}", raw)));
    }

    #[test]
    fn missing_row_is_invalid() {
        assert!(matches!(check_manage_token(None, Utc::now()), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn expired_row_is_expired() {
        let now = Utc::now();
        let result = check_manage_token(Some(row(now - Duration::seconds(1), None)), now);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn used_row_is_invalid() {
        let now = Utc::now();
        let result = check_manage_token(Some(row(now + Duration::days(1), Some(now))), now);
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[test]
    fn fresh_row_is_accepted_repeatedly() {
        let now = Utc::now();
        let r = row(now + Duration::days(30), None);
        assert!(check_manage_token(Some(r.clone()), now).is_ok());
        assert!(check_manage_token(Some(r), now + Duration::days(1)).is_ok());
    }
}
