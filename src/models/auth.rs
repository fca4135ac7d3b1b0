// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::appointment::ActorType;

// Representa um usuário (dono ou equipe) vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Manager,
    Staff,
}

impl MemberRole {
    /// Como o papel aparece na trilha de auditoria.
    pub fn actor_type(self) -> ActorType {
        match self {
            MemberRole::Owner | MemberRole::Manager => ActorType::Admin,
            MemberRole::Staff => ActorType::Staff,
        }
    }
}

// Dados para registro de um novo usuário
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(email(code = "email"))]
    #[schema(example = "dono@barbearia.com")]
    pub email: String,
    #[validate(length(min = 6, code = "length"))]
    pub password: String,
    pub full_name: Option<String>,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(code = "email"))]
    pub email: String,
    #[validate(length(min = 6, code = "length"))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_and_managers_audit_as_admin() {
        assert_eq!(MemberRole::Owner.actor_type(), ActorType::Admin);
        assert_eq!(MemberRole::Manager.actor_type(), ActorType::Admin);
        assert_eq!(MemberRole::Staff.actor_type(), ActorType::Staff);
    }
}
