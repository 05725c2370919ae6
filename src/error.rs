//! Error types for the network boundaries the coordinator talks to.
//!
//! Each collaborator gets its own enum so the coordinator can classify a failure
//! into a [`FailureKind`] without string matching at the call site.

use crate::model::FailureKind;
use thiserror::Error;

/// Errors from the authentication provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider could not be reached or answered with garbage.
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the persistence API.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// 400-class rejection of a malformed request.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message fragments the persistence API uses for credential problems.
const AUTH_MARKERS: [&str; 3] = ["Authorization", "Authentication", "token"];

impl PersistError {
    /// Classify a non-success response by status first, then by message content.
    pub fn from_response(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 401 || AUTH_MARKERS.iter().any(|m| message.contains(m)) {
            return Self::Unauthorized(message);
        }
        if (400..500).contains(&status) {
            Self::Rejected { status, message }
        } else {
            Self::Api { status, message }
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized(_) => FailureKind::Authentication,
            Self::Rejected { .. } => FailureKind::Validation,
            Self::Api { .. } | Self::Http(_) | Self::Json(_) => FailureKind::Server,
        }
    }
}

/// Errors from the generative-content provider.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content provider rejected credentials")]
    Unauthorized,

    #[error("content provider error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ContentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized => FailureKind::Authentication,
            Self::Api { .. } | Self::Http(_) => FailureKind::Provider,
        }
    }
}

/// Name generation failed; the caller shows "generation failed".
#[derive(Debug, Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(#[from] pub ContentError);

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        self.0.kind()
    }
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("select a name first")]
    NothingSelected,

    #[error("unexpected {0} response shape")]
    UnexpectedShape(&'static str),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl EnrichmentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NothingSelected => FailureKind::Validation,
            Self::UnexpectedShape(_) => FailureKind::Provider,
            Self::Content(e) => e.kind(),
        }
    }
}
