use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StageError;

/// One unit of input to a stage: a file on disk or a derived key.
///
/// The size and modification time are captured when the item is created so
/// the identity used for cache fingerprints changes whenever the file does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    key: String,
    path: PathBuf,
    len: u64,
    modified: Option<u64>,
}

impl WorkItem {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StageError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| StageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64);

        Ok(Self {
            key: path.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            len: metadata.len(),
            modified,
        })
    }

    /// An item that exists only as a key, e.g. an entry of an analysis file.
    pub fn derived(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            path: PathBuf::from(&key),
            key,
            len: 0,
            modified: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.clone())
    }

    /// Stable, serialisable identity for fingerprinting.
    pub fn identity(&self) -> String {
        json!({
            "key": self.key,
            "len": self.len,
            "modified": self.modified,
        })
        .to_string()
    }
}
