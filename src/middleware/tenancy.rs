// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::common::error::{ApiError, AppError};

// O nome do nosso cabeçalho HTTP customizado
pub const ESTABLISHMENT_ID_HEADER: &str = "x-establishment-id";

// Estabelecimento em que o membro está operando, validado pelo tenant_guard
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

/// Lê e converte o cabeçalho `x-establishment-id`.
pub fn establishment_id_from_headers(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let value = headers
        .get(ESTABLISHMENT_ID_HEADER)
        .ok_or_else(|| AppError::InvalidInput(format!("O cabeçalho {} é obrigatório.", ESTABLISHMENT_ID_HEADER)))?;

    let value_str = value.to_str().map_err(|_| {
        AppError::InvalidInput(format!("Cabeçalho {} contém caracteres inválidos.", ESTABLISHMENT_ID_HEADER))
    })?;

    Uuid::parse_str(value_str.trim())
        .map_err(|_| AppError::InvalidInput(format!("Cabeçalho {} inválido (não é um UUID).", ESTABLISHMENT_ID_HEADER)))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<TenantContext>().copied().ok_or(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Contexto do estabelecimento não encontrado".into(),
            code: None,
            details: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert!(matches!(establishment_id_from_headers(&headers), Err(AppError::InvalidInput(_))));

        headers.insert(ESTABLISHMENT_ID_HEADER, HeaderValue::from_static("loja-1"));
        assert!(matches!(establishment_id_from_headers(&headers), Err(AppError::InvalidInput(_))));

        let id = Uuid::new_v4();
        headers.insert(ESTABLISHMENT_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(establishment_id_from_headers(&headers).unwrap(), id);
    }
}
