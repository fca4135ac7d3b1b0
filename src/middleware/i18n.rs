// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

const DEFAULT_LANG: &str = "en";

// Idioma da resposta, tirado do Accept-Language
#[derive(Debug, Clone)]
pub struct Locale(pub String);

/// "pt-BR,pt;q=0.9" -> "pt"
pub fn primary_language(header_str: &str) -> Option<String> {
    accept_language::parse(header_str)
        .first()
        .and_then(|tag| tag.split('-').next())
        .map(|lang| lang.to_ascii_lowercase())
        .filter(|lang| !lang.is_empty())
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(primary_language)
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        Ok(Locale(lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_preferred_primary_subtag() {
        assert_eq!(primary_language("pt-BR,pt;q=0.9,en;q=0.8").as_deref(), Some("pt"));
        assert_eq!(primary_language("en;q=0.5, pt;q=0.9").as_deref(), Some("pt"));
        assert_eq!(primary_language("").as_deref(), None);
    }
}
