#![allow(dead_code)]

use async_trait::async_trait;
use pet_namer::engine::{ContentEvent, ContentProvider, Enricher, NameGenerator, PersistenceApi};
use pet_namer::error::{ContentError, PersistError};
use pet_namer::model::{Cardinality, Identity, SavedRecord};
use pet_namer::orchestrator::Services;
use pet_namer::session::Session;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

pub fn user_a() -> Uuid {
    Uuid::from_u128(0xa)
}

pub fn user_b() -> Uuid {
    Uuid::from_u128(0xb)
}

pub fn session(user_id: Uuid, token: &str) -> Session {
    Session {
        user_id,
        access_token: token.to_string(),
    }
}

/// In-memory saved-names API that scopes rows by the caller's user id.
#[derive(Default)]
pub struct FakeApi {
    rows: Mutex<Vec<SavedRecord>>,
    fail_save: Mutex<Option<u16>>,
    fail_names: Mutex<Vec<String>>,
    held_fetches: Mutex<Vec<(Uuid, Arc<Notify>)>>,
    held_saves: Mutex<Vec<(String, Arc<Notify>)>>,
    pub save_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub save_callers: Mutex<Vec<Uuid>>,
    pub save_batches: Mutex<Vec<Vec<String>>>,
}

impl FakeApi {
    pub fn seeded(rows: Vec<(Uuid, &str)>) -> Self {
        let api = Self::default();
        for (user, name) in rows {
            api.push(user, name);
        }
        api
    }

    /// Make every save fail with `status` until cleared.
    pub fn fail_saves_with(&self, status: Option<u16>) {
        *self.fail_save.lock().unwrap() = status;
    }

    /// Fail any save that includes `name` with a 500.
    pub fn fail_saves_of(&self, name: &str) {
        self.fail_names.lock().unwrap().push(name.to_string());
    }

    /// Fetches for `user` read the table, then wait on `gate` before replying.
    pub fn hold_fetches_of(&self, user: Uuid, gate: Arc<Notify>) {
        self.held_fetches.lock().unwrap().push((user, gate));
    }

    /// Saves that include `name` wait on `gate` before touching the table.
    pub fn hold_saves_of(&self, name: &str, gate: Arc<Notify>) {
        self.held_saves
            .lock()
            .unwrap()
            .push((name.to_string(), gate));
    }

    fn push(&self, user_id: Uuid, name: &str) -> SavedRecord {
        let mut rows = self.rows.lock().unwrap();
        let rec = SavedRecord {
            id: rows.len() as i64 + 1,
            name: name.to_string(),
            created_at: None,
            user_id,
        };
        rows.push(rec.clone());
        rec
    }
}

#[async_trait]
impl PersistenceApi for FakeApi {
    async fn fetch_saved(&self, identity: &Identity) -> Result<Vec<SavedRecord>, PersistError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot: Vec<SavedRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == identity.user_id)
            .cloned()
            .collect();
        let gate = self
            .held_fetches
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| *u == identity.user_id)
            .map(|(_, g)| g.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn save_batch(
        &self,
        identity: &Identity,
        names: &[String],
    ) -> Result<Vec<SavedRecord>, PersistError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.save_callers.lock().unwrap().push(identity.user_id);
        self.save_batches.lock().unwrap().push(names.to_vec());

        let gate = self
            .held_saves
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| names.contains(n))
            .map(|(_, g)| g.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failing = {
            let fail_names = self.fail_names.lock().unwrap();
            names.iter().any(|n| fail_names.contains(n))
        };
        let status = match *self.fail_save.lock().unwrap() {
            Some(status) => Some(status),
            None if failing => Some(500),
            None => None,
        };
        if let Some(status) = status {
            let message = if status == 401 {
                "Authentication failed"
            } else {
                "Error saving names"
            };
            return Err(PersistError::from_response(status, message));
        }
        Ok(names.iter().map(|n| self.push(identity.user_id, n)).collect())
    }
}

/// Content provider with a canned name list. When `gate` is set, name generation
/// waits for a permit before replying; `story_gate` does the same for narratives.
pub struct FakeContent {
    names: Mutex<Value>,
    pub gate: Option<Arc<Notify>>,
    pub story_gate: Option<Arc<Notify>>,
    failing: Mutex<Vec<ContentEvent>>,
    pub calls: AtomicUsize,
}

impl FakeContent {
    pub fn replying(names: Value) -> Self {
        Self {
            names: Mutex::new(names),
            gate: None,
            story_gate: None,
            failing: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn gated(names: Value, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::replying(names)
        }
    }

    pub fn with_story_gate(mut self, gate: Arc<Notify>) -> Self {
        self.story_gate = Some(gate);
        self
    }

    pub fn set_names(&self, names: Value) {
        *self.names.lock().unwrap() = names;
    }

    /// Answer `event` with a provider error from now on.
    pub fn fail(&self, event: ContentEvent) {
        self.failing.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ContentProvider for FakeContent {
    async fn create_event(
        &self,
        _identity: &Identity,
        event: ContentEvent,
        data: Value,
    ) -> Result<Value, ContentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&event) {
            return Err(ContentError::Api {
                status: 502,
                message: "upstream timed out".into(),
            });
        }
        match event {
            ContentEvent::GenerateImage => Ok(json!({ "url": "https://img.test/pet.png" })),
            ContentEvent::TextToSpeech => Ok(json!("https://audio.test/pet.mp3")),
            ContentEvent::ChatgptRequest if data["response_type"] == "text" => {
                if let Some(gate) = &self.story_gate {
                    gate.notified().await;
                }
                Ok(json!("Once upon a time there was a very good pet."))
            }
            ContentEvent::ChatgptRequest => {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                Ok(self.names.lock().unwrap().clone())
            }
        }
    }
}

pub fn services(api: Arc<FakeApi>, content: Arc<FakeContent>) -> Services {
    Services {
        persistence: api,
        generator: Arc::new(NameGenerator::new(content.clone(), Cardinality::Five)),
        enricher: Arc::new(Enricher::new(content)),
    }
}
