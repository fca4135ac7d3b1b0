// src/models/portal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortalLoginPayload {
    #[validate(length(min = 1, code = "required"))]
    #[schema(example = "barbearia-do-ze")]
    pub establishment_slug: String,
    #[validate(length(min = 1, code = "required"))]
    #[schema(example = "maria")]
    pub professional_slug: String,
    #[validate(length(min = 1, code = "required"))]
    pub password: String,
}

/// Sessão aberta no portal. O token só aparece nesta resposta.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortalSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub professional_id: Uuid,
    pub professional_name: String,
}
