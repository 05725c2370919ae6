use crate::engine::content::{ContentEvent, ContentProvider, PromptRequest, ResponseType};
use crate::error::GenerationError;
use crate::model::{Cardinality, Identity};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Shapes the provider is asked to produce.
#[derive(Deserialize)]
#[serde(untagged)]
enum NamesShape {
    List(Vec<String>),
    Wrapped { names: Vec<String> },
}

pub struct NameGenerator {
    provider: Arc<dyn ContentProvider>,
    cardinality: Cardinality,
}

impl NameGenerator {
    pub fn new(provider: Arc<dyn ContentProvider>, cardinality: Cardinality) -> Self {
        Self {
            provider,
            cardinality,
        }
    }

    /// Ask the provider for suggestions. A reply of the wrong shape yields an empty
    /// list; only transport/provider failures are errors.
    pub async fn generate(
        &self,
        identity: &Identity,
        species: &str,
        traits: &str,
    ) -> Result<Vec<String>, GenerationError> {
        let req = PromptRequest {
            prompt: build_prompt(species, traits, self.cardinality),
            response_type: Some(ResponseType::Json),
        };
        let data = serde_json::to_value(&req).unwrap_or(Value::Null);
        let reply = self
            .provider
            .create_event(identity, ContentEvent::ChatgptRequest, data)
            .await?;
        let names = parse_candidates(reply);
        tracing::debug!(species, count = names.len(), "generated candidates");
        Ok(names)
    }
}

pub fn build_prompt(species: &str, traits: &str, cardinality: Cardinality) -> String {
    let traits = traits.trim();
    let subject = if traits.is_empty() {
        species.trim().to_string()
    } else {
        format!("{} that is {}", species.trim(), traits)
    };
    let n = cardinality.count();
    match cardinality {
        Cardinality::Five => format!(
            "Provide a JSON array of {n} unique and cute names for a {subject}. \
             Format: [\"name1\", \"name2\", ...]"
        ),
        Cardinality::Ten => format!(
            "Provide a JSON object with a \"names\" key containing {n} unique and cute names \
             for a {subject}. Format: {{\"names\": [\"name1\", \"name2\", ...]}}"
        ),
    }
}

/// Extract candidate names from an untrusted reply.
pub fn parse_candidates(reply: Value) -> Vec<String> {
    let reply = match reply {
        // Some providers return the JSON document as a string.
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        },
        other => other,
    };
    let names = match serde_json::from_value::<NamesShape>(reply) {
        Ok(NamesShape::List(v)) | Ok(NamesShape::Wrapped { names: v }) => v,
        Err(_) => return Vec::new(),
    };

    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for n in names {
        let n = n.trim();
        if !n.is_empty() && !out.iter().any(|o| o == n) {
            out.push(n.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContentError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Canned {
        reply: Mutex<Option<Result<Value, ContentError>>>,
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ContentProvider for Canned {
        async fn create_event(
            &self,
            _identity: &Identity,
            _event: ContentEvent,
            data: Value,
        ) -> Result<Value, ContentError> {
            self.seen.lock().unwrap().push(data);
            self.reply.lock().unwrap().take().unwrap()
        }
    }

    #[test]
    fn array_reply_keeps_order() {
        let names = parse_candidates(json!(["Rex", "Bella", "Max"]));
        assert_eq!(names, vec!["Rex", "Bella", "Max"]);
    }

    #[test]
    fn wrapped_and_stringified_replies_parse() {
        assert_eq!(parse_candidates(json!({"names": ["Luna"]})), vec!["Luna"]);
        assert_eq!(
            parse_candidates(Value::String("[\"Pip\", \"Rex\"]".into())),
            vec!["Pip", "Rex"]
        );
    }

    #[test]
    fn malformed_replies_are_empty() {
        assert!(parse_candidates(json!({"suggestions": ["Rex"]})).is_empty());
        assert!(parse_candidates(json!([1, 2, 3])).is_empty());
        assert!(parse_candidates(json!("not json at all")).is_empty());
        assert!(parse_candidates(Value::Null).is_empty());
    }

    #[test]
    fn blanks_and_duplicates_collapse() {
        let names = parse_candidates(json!(["Rex", " ", "Rex", "Max "]));
        assert_eq!(names, vec!["Rex", "Max"]);
    }

    #[test]
    fn prompt_states_count_and_shape() {
        let p = build_prompt("Dog", "playful", Cardinality::Five);
        assert!(p.contains("JSON array of 5"));
        assert!(p.contains("Dog that is playful"));
        let p = build_prompt("Cat", "", Cardinality::Ten);
        assert!(p.contains("\"names\" key containing 10"));
    }

    #[tokio::test]
    async fn generate_sends_json_prompt() {
        let provider = Arc::new(Canned {
            reply: Mutex::new(Some(Ok(json!(["Rex", "Buddy"])))),
            seen: Mutex::new(Vec::new()),
        });
        let g = NameGenerator::new(provider.clone(), Cardinality::Five);
        let id = Identity::new(Uuid::from_u128(1), "t");
        let names = g.generate(&id, "Dog", "playful").await.unwrap();
        assert_eq!(names, vec!["Rex", "Buddy"]);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0]["response_type"], "json");
    }

    #[tokio::test]
    async fn provider_failure_is_generation_error() {
        let provider = Arc::new(Canned {
            reply: Mutex::new(Some(Err(ContentError::Api {
                status: 500,
                message: "boom".into(),
            }))),
            seen: Mutex::new(Vec::new()),
        });
        let g = NameGenerator::new(provider, Cardinality::Five);
        let id = Identity::new(Uuid::from_u128(1), "t");
        assert!(g.generate(&id, "Dog", "").await.is_err());
    }
}
