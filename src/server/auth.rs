use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Malformed Authorization header")]
    Malformed,
    #[error("Invalid token")]
    UnknownToken,
}

/// Bearer tokens accepted by the server and the user each one belongs to.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, Uuid>,
}

impl TokenTable {
    pub fn new(pairs: impl IntoIterator<Item = (String, Uuid)>) -> Self {
        Self {
            tokens: pairs.into_iter().collect(),
        }
    }

    /// Resolve the caller from `Authorization: Bearer <token>`.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, AuthFailure> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthFailure::MissingHeader)?
            .to_str()
            .map_err(|_| AuthFailure::Malformed)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthFailure::Malformed)?;
        self.tokens
            .get(token)
            .copied()
            .ok_or(AuthFailure::UnknownToken)
    }
}
