use crate::error::PersistError;
use crate::model::{Identity, SavedRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The saved-names API, scoped to the identity passed on each call.
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    async fn fetch_saved(&self, identity: &Identity) -> Result<Vec<SavedRecord>, PersistError>;

    /// Insert `names` for `identity`. An empty batch never reaches the network.
    async fn save_batch(
        &self,
        identity: &Identity,
        names: &[String],
    ) -> Result<Vec<SavedRecord>, PersistError>;
}

#[derive(Serialize)]
struct SaveNamesBody<'a> {
    names: &'a [String],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpPersistence {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPersistence {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_records(resp: reqwest::Response) -> Result<Vec<SavedRecord>, PersistError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    if body.is_empty() {
                        status.canonical_reason().unwrap_or("").to_string()
                    } else {
                        body
                    }
                });
            return Err(PersistError::from_response(status.as_u16(), message));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PersistenceApi for HttpPersistence {
    async fn fetch_saved(&self, identity: &Identity) -> Result<Vec<SavedRecord>, PersistError> {
        let resp = self
            .http
            .get(self.url("/api/getNames"))
            .header(reqwest::header::AUTHORIZATION, identity.bearer())
            .send()
            .await?;
        Self::read_records(resp).await
    }

    async fn save_batch(
        &self,
        identity: &Identity,
        names: &[String],
    ) -> Result<Vec<SavedRecord>, PersistError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .http
            .post(self.url("/api/saveNames"))
            .header(reqwest::header::AUTHORIZATION, identity.bearer())
            .json(&SaveNamesBody { names })
            .send()
            .await?;
        Self::read_records(resp).await
    }
}
