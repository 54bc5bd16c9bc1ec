//! Artifact store
//!
//! Render outputs are owned artifacts with a two-state lifecycle: a record
//! is created `locked` before the engine runs and flips to `saved` only
//! after the file exists at its recorded path. Any failure removes both the
//! record and the partial file: no file, no record. Records live in memory
//! (DashMap) and are mirrored to `locked/index.json` so the invariant
//! survives restarts.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{RenderError, Result};

const INDEX_FILE: &str = "locked/index.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Locked,
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Derive from the canvas: taller than wide is portrait.
    pub fn from_canvas(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// One persisted render output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedContent {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub duration_seconds: u32,
    pub status: ArtifactStatus,
    /// Relative path under the media root, set when saved.
    pub file: Option<String>,
    pub orientation: Orientation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Store of owned artifacts, keyed by id.
pub struct ArtifactStore {
    media_root: PathBuf,
    records: DashMap<String, LockedContent>,
    /// Serializes index snapshots; record mutations are already per-key.
    persist_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Open the store rooted at `media_root`, loading any persisted index.
    pub fn open(media_root: &Path) -> Result<Self> {
        let store = Self {
            media_root: media_root.to_path_buf(),
            records: DashMap::new(),
            persist_lock: Mutex::new(()),
        };
        let index_path = store.media_root.join(INDEX_FILE);
        if index_path.is_file() {
            let content = std::fs::read_to_string(&index_path)?;
            let records: Vec<LockedContent> = serde_json::from_str(&content)
                .map_err(|e| RenderError::Storage(format!("corrupt artifact index: {e}")))?;
            for record in records {
                store.records.insert(record.id.clone(), record);
            }
        }
        Ok(store)
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Create a subdirectory of the media root on demand.
    pub fn ensure_subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.media_root.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Relative artifact path for an id and extension.
    pub fn relative_locked_path(id: &str, ext: &str) -> String {
        format!("locked/{id}.{ext}")
    }

    /// Create a record in `locked` state ahead of rendering.
    pub fn create_locked(
        &self,
        owner: &str,
        name: &str,
        kind: ArtifactKind,
        duration_seconds: u32,
        orientation: Orientation,
    ) -> Result<LockedContent> {
        let now = Utc::now();
        let record = LockedContent {
            id: Uuid::new_v4().simple().to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            kind,
            duration_seconds,
            status: ArtifactStatus::Locked,
            file: None,
            orientation,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(record.id.clone(), record.clone());
        self.persist()?;
        Ok(record)
    }

    /// Transition a record to `saved` with its final relative path.
    pub fn mark_saved(&self, id: &str, file: &str) -> Result<LockedContent> {
        let updated = {
            let mut entry = self
                .records
                .get_mut(id)
                .ok_or_else(|| RenderError::NotFound(format!("artifact {id}")))?;
            entry.status = ArtifactStatus::Saved;
            entry.file = Some(file.to_string());
            entry.updated_at = Utc::now();
            entry.clone()
        };
        self.persist()?;
        Ok(updated)
    }

    /// Remove a record (rollback or deletion). Best effort on persistence.
    pub fn remove(&self, id: &str) -> Option<LockedContent> {
        let removed = self.records.remove(id).map(|(_, record)| record);
        if removed.is_some() {
            if let Err(e) = self.persist() {
                tracing::warn!("Failed to persist artifact index after removal: {}", e);
            }
        }
        removed
    }

    /// Fetch a record scoped to its owner. A foreign owner sees "not found"
    /// rather than learning the artifact exists.
    pub fn get_owned(&self, owner: &str, id: &str) -> Result<LockedContent> {
        let record = self
            .records
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| RenderError::NotFound(format!("artifact {id}")))?;
        if record.owner != owner {
            return Err(RenderError::NotFound(format!("artifact {id}")));
        }
        Ok(record)
    }

    /// All of an owner's artifacts, newest first.
    pub fn list_for_owner(&self, owner: &str) -> Vec<LockedContent> {
        let mut records: Vec<LockedContent> = self
            .records
            .iter()
            .filter(|r| r.owner == owner)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }

    /// Snapshot all records to the index file (temp write, then rename).
    fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        let mut records: Vec<LockedContent> =
            self.records.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let dir = self.ensure_subdir("locked")?;
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| RenderError::Storage(e.to_string()))?;
        let tmp = dir.join(".index.json.tmp");
        std::fs::write(&tmp, json).map_err(|e| RenderError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, self.media_root.join(INDEX_FILE))
            .map_err(|e| RenderError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Deletes the record and partial output unless the render completed.
///
/// Held across the engine invocation so a failed or cancelled render (the
/// request future being dropped included) never leaves a `locked` record or
/// a partial file behind.
pub struct RollbackGuard<'a> {
    store: &'a ArtifactStore,
    id: String,
    file: PathBuf,
    defused: bool,
}

impl<'a> RollbackGuard<'a> {
    pub fn new(store: &'a ArtifactStore, id: &str, file: PathBuf) -> Self {
        Self {
            store,
            id: id.to_string(),
            file,
            defused: false,
        }
    }

    /// The render succeeded; keep the record and file.
    pub fn defuse(mut self) {
        self.defused = true;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.defused {
            return;
        }
        let _ = std::fs::remove_file(&self.file);
        self.store.remove(&self.id);
        tracing::debug!("Rolled back artifact {}", self.id);
    }
}
