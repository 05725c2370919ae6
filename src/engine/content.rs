use crate::error::ContentError;
use crate::model::Identity;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Event kinds understood by the content backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentEvent {
    ChatgptRequest,
    GenerateImage,
    TextToSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Text,
}

/// Payload for `chatgpt_request` and `generate_image`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
}

/// Generative-content collaborator. Replies carry no guaranteed shape; callers
/// validate what comes back.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn create_event(
        &self,
        identity: &Identity,
        event: ContentEvent,
        data: Value,
    ) -> Result<Value, ContentError>;
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    #[serde(rename = "type")]
    kind: ContentEvent,
    data: &'a Value,
}

pub struct HttpContentProvider {
    http: reqwest::Client,
    url: String,
}

impl HttpContentProvider {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn create_event(
        &self,
        identity: &Identity,
        event: ContentEvent,
        data: Value,
    ) -> Result<Value, ContentError> {
        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, identity.bearer())
            .json(&EventEnvelope { kind: event, data: &data })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ContentError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ContentError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        // Text replies come back raw; keep them as a JSON string.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
