use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Authenticated principal plus the bearer credential of its session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub access_token: String,
}

impl Identity {
    pub fn new(user_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            access_token: access_token.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A persisted name row. Wire format matches the `pet_names` table, camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecord {
    pub id: i64,
    pub name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(alias = "ownerId")]
    pub user_id: Uuid,
}

/// How many suggestions a generation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cardinality {
    #[default]
    Five,
    Ten,
}

impl Cardinality {
    pub fn count(self) -> usize {
        match self {
            Cardinality::Five => 5,
            Cardinality::Ten => 10,
        }
    }
}

/// Whether enrichment actions may overlap while one is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum ActionPolicy {
    /// One action at a time across generate/image/speech/narrative.
    #[default]
    Exclusive,
    /// Enrichment actions may run side by side; generation stays single-flight.
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub content_url: String,
    pub cardinality: Cardinality,
    pub action_policy: ActionPolicy,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Accepted bearer tokens and the user each one authenticates.
    pub tokens: Vec<(String, Uuid)>,
    /// `None` keeps records in memory only.
    pub store_path: Option<PathBuf>,
}

/// User-triggered asynchronous actions tracked by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Generate,
    Image,
    Speech,
    Narrative,
    Fetch,
    Save,
}

impl Action {
    /// Actions that share the busy flag under [`ActionPolicy::Exclusive`].
    pub fn is_exclusive_kind(self) -> bool {
        matches!(
            self,
            Action::Generate | Action::Image | Action::Speech | Action::Narrative
        )
    }
}

/// Coarse failure classes surfaced to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Re-authentication is the corrective action.
    Authentication,
    /// Request rejected as malformed.
    Validation,
    /// Content provider timed out or returned garbage.
    Provider,
    /// Anything else.
    Server,
}

/// Notifications emitted by the coordinator for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ViewEvent {
    IdentityChanged {
        user_id: Option<Uuid>,
    },
    CandidatesReady {
        count: usize,
    },
    SavedListUpdated {
        total: usize,
    },
    RecordsSaved {
        // Box keeps the enum small when batches are large.
        records: Box<Vec<SavedRecord>>,
    },
    EnrichmentReady {
        action: Action,
    },
    ActionFailed {
        action: Action,
        kind: FailureKind,
    },
    Info(InfoEvent),
}

/// Structured info events consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    Refused { action: Action, reason: String },
    StaleResponseDropped { action: Action },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Refused { action, reason } => {
                format!("{action:?} not started: {reason}")
            }
            InfoEvent::StaleResponseDropped { action } => {
                format!("Ignored {action:?} response from a previous session")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_record_reads_drizzle_row() {
        let raw = r#"{"id":1,"name":"Fido","createdAt":"2024-05-01T10:00:00Z","userId":"6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11"}"#;
        let rec: SavedRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.id, 1);
        assert_eq!(rec.name, "Fido");
        assert!(rec.created_at.is_some());
    }

    #[test]
    fn saved_record_accepts_owner_id_and_null_timestamp() {
        let raw = r#"{"id":2,"name":"Rex","createdAt":null,"ownerId":"6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11"}"#;
        let rec: SavedRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.created_at, None);
        assert_eq!(
            rec.user_id,
            Uuid::parse_str("6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11").unwrap()
        );
    }

    #[test]
    fn identity_debug_hides_token() {
        let id = Identity::new(Uuid::nil(), "secret-token");
        let dbg = format!("{id:?}");
        assert!(!dbg.contains("secret-token"));
        assert_eq!(id.bearer(), "Bearer secret-token");
    }
}
