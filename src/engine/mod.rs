//! Network collaborators: content generation, enrichment and the persistence API.

pub mod content;
pub mod enrichment;
pub mod generator;
pub mod persistence;

use crate::model::ClientConfig;
use anyhow::{Context, Result};

pub use content::{ContentEvent, ContentProvider, HttpContentProvider};
pub use enrichment::{Enricher, Enrichment};
pub use generator::NameGenerator;
pub use persistence::{HttpPersistence, PersistenceApi};

/// Shared HTTP client; transport timeout is the only timeout policy.
pub fn build_http_client(cfg: &ClientConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(cfg.request_timeout)
        .build()
        .context("build HTTP client")
}
