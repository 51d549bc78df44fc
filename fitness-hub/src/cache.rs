//! Key-value storage for overview snapshots.
//!
//! Values are opaque JSON strings; interpreting them (and treating unreadable
//! ones as a miss) is the caller's job.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fitness_providers::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Key under which the combined overview is stored.
pub const OVERVIEW_CACHE_KEY: &str = "overview:snapshot";

/// Metadata stored next to each value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub generated_at: String,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String, metadata: SnapshotMetadata) -> Result<()>;

    async fn metadata(&self, key: &str) -> Result<Option<SnapshotMetadata>>;
}

/// Process-local store; contents vanish on exit.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, (String, SnapshotMetadata)>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).map(|(value, _)| value.clone()))
    }

    async fn put(&self, key: &str, value: String, metadata: SnapshotMetadata) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), (value, metadata));
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<Option<SnapshotMetadata>> {
        Ok(self.entries.read().get(key).map(|(_, meta)| meta.clone()))
    }
}

/// One JSON file per key plus a `.meta.json` sidecar, under `dir`.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.meta.json", file_stem(key)))
    }
}

/// Keys may hold `:` and `/`; keep file names portable.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::internal(format!("Unable to {} snapshot store", action))
        .with_detail(format!("{}: {}", path.display(), err))
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("read", path, e)),
    }
}

/// Write through a temporary file so readers never see a partial value.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| io_error("write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error("write", path, e))
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        read_optional(&self.value_path(key)).await
    }

    async fn put(&self, key: &str, value: String, metadata: SnapshotMetadata) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, e))?;

        let metadata = serde_json::to_vec(&metadata)
            .map_err(|e| Error::internal("Unable to encode snapshot metadata").with_detail(e.to_string()))?;

        write_atomic(&self.value_path(key), value.as_bytes()).await?;
        write_atomic(&self.metadata_path(key), &metadata).await?;
        debug!(key, dir = %self.dir.display(), "Stored snapshot");
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<Option<SnapshotMetadata>> {
        let Some(raw) = read_optional(&self.metadata_path(key)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }
}
