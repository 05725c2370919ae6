//! Image, speech and narrative generation keyed off the first selected name.

use crate::engine::content::{ContentEvent, ContentProvider, PromptRequest, ResponseType};
use crate::error::EnrichmentError;
use crate::model::Identity;
use serde_json::{json, Value};
use std::sync::Arc;

/// Finished enrichment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// Image URL.
    Image(String),
    /// Audio URL.
    Speech(String),
    /// Markdown text; rendering is up to the caller.
    Narrative(String),
}

pub struct Enricher {
    provider: Arc<dyn ContentProvider>,
}

impl Enricher {
    pub fn new(provider: Arc<dyn ContentProvider>) -> Self {
        Self { provider }
    }

    /// Picture of the pet. Works without a selection by using a generic subject.
    pub async fn image(
        &self,
        identity: &Identity,
        species: &str,
        name: Option<&str>,
    ) -> Result<Enrichment, EnrichmentError> {
        let prompt = match name {
            Some(n) => format!("A cute {species} named {n}, friendly portrait"),
            None => format!("A cute {species}, friendly portrait"),
        };
        let req = PromptRequest {
            prompt,
            response_type: None,
        };
        let reply = self
            .provider
            .create_event(identity, ContentEvent::GenerateImage, to_value(&req))
            .await?;
        extract_text(reply, &["url", "image_url", "imageUrl"])
            .map(Enrichment::Image)
            .ok_or(EnrichmentError::UnexpectedShape("image"))
    }

    /// Spoken rendition of the name.
    pub async fn speech(
        &self,
        identity: &Identity,
        name: Option<&str>,
    ) -> Result<Enrichment, EnrichmentError> {
        let name = name.ok_or(EnrichmentError::NothingSelected)?;
        let reply = self
            .provider
            .create_event(identity, ContentEvent::TextToSpeech, json!({ "text": name }))
            .await?;
        extract_text(reply, &["url", "audio_url", "audioUrl"])
            .map(Enrichment::Speech)
            .ok_or(EnrichmentError::UnexpectedShape("speech"))
    }

    /// Short story about the named pet.
    pub async fn narrative(
        &self,
        identity: &Identity,
        species: &str,
        name: Option<&str>,
    ) -> Result<Enrichment, EnrichmentError> {
        let name = name.ok_or(EnrichmentError::NothingSelected)?;
        let req = PromptRequest {
            prompt: format!(
                "Write a short, heartwarming story in markdown about a {species} named {name}."
            ),
            response_type: Some(ResponseType::Text),
        };
        let reply = self
            .provider
            .create_event(identity, ContentEvent::ChatgptRequest, to_value(&req))
            .await?;
        extract_text(reply, &["text", "story"])
            .map(Enrichment::Narrative)
            .ok_or(EnrichmentError::UnexpectedShape("narrative"))
    }
}

fn to_value(req: &PromptRequest) -> Value {
    serde_json::to_value(req).unwrap_or(Value::Null)
}

/// Accept either a bare string or an object carrying the string under one of `keys`.
fn extract_text(reply: Value, keys: &[&str]) -> Option<String> {
    let s = match reply {
        Value::String(s) => s,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::String(s)) => Some(s),
                _ => None,
            })?,
        _ => return None,
    };
    (!s.trim().is_empty()).then_some(s)
}
