use crate::model::SavedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("insert needs at least one name")]
    EmptyInsert,
}

/// Backing table for saved names.
#[async_trait]
pub trait NameStore: Send + Sync {
    /// Rows owned by `user_id`, oldest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<SavedRecord>, StoreError>;
    /// Insert one row per name for `user_id` and return the new rows.
    async fn insert(&self, user_id: Uuid, names: &[String]) -> Result<Vec<SavedRecord>, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Table {
    next_id: i64,
    rows: Vec<SavedRecord>,
}

/// Rows kept in memory and, when a path is set, mirrored to a JSON file after every
/// insert.
pub struct JsonNameStore {
    path: Option<PathBuf>,
    table: Mutex<Table>,
}

/// Default location of the store file.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("pet-namer").join("names.json"))
}

impl JsonNameStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: Mutex::new(Table {
                next_id: 1,
                rows: Vec::new(),
            }),
        }
    }

    /// Load `path` if it exists, otherwise start empty and create it on first insert.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table {
                next_id: 1,
                rows: Vec::new(),
            },
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), rows = table.rows.len(), "opened name store");
        Ok(Self {
            path: Some(path),
            table: Mutex::new(table),
        })
    }

    fn write(path: &Path, table: &Table) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(table)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl NameStore for JsonNameStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<SavedRecord>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, user_id: Uuid, names: &[String]) -> Result<Vec<SavedRecord>, StoreError> {
        if names.is_empty() {
            return Err(StoreError::EmptyInsert);
        }
        let mut table = self.table.lock().await;
        let now = OffsetDateTime::now_utc();
        let first_id = table.next_id.max(1);
        let inserted: Vec<SavedRecord> = names
            .iter()
            .enumerate()
            .map(|(i, name)| SavedRecord {
                id: first_id + i as i64,
                name: name.clone(),
                created_at: Some(now),
                user_id,
            })
            .collect();

        table.rows.extend(inserted.iter().cloned());
        table.next_id = first_id + inserted.len() as i64;
        if let Some(path) = &self.path {
            if let Err(e) = Self::write(path, &table) {
                // Nothing was acknowledged; undo the in-memory insert.
                let keep = table.rows.len() - inserted.len();
                table.rows.truncate(keep);
                table.next_id = first_id;
                return Err(e);
            }
        }
        Ok(inserted)
    }
}
