use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::fingerprint::Fingerprint;
use crate::error::CacheError;

/// Directory under the run folder that holds per-item artifacts.
pub const CACHE_DIR: &str = ".cache";

/// Writes `content` to `path` via a sibling temp file and a rename, so a
/// reader never observes a half-written artifact. Existing files are replaced.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let write_temp = || -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()
    };

    if let Err(e) = write_temp() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(CacheError::Write {
            path: path.to_path_buf(),
            source: e,
        });
    }

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        CacheError::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

pub fn ensure_directory(path: &Path) -> Result<(), CacheError> {
    std::fs::create_dir_all(path).map_err(|e| CacheError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads and parses an artifact. A file that exists but does not parse into
/// `T` is reported as corrupt, never as absent.
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let content = std::fs::read(path).map_err(|e| CacheError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_slice(&content).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn write_artifact<T: Serialize + ?Sized>(path: &Path, artifact: &T) -> Result<(), CacheError> {
    let content = serde_json::to_vec_pretty(artifact)?;
    write_atomic(path, &content)
}

/// Fingerprint-addressed artifacts for one stage.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The store for `stage` inside a run folder.
    pub fn for_stage(folder: &Path, stage: &str) -> Self {
        Self::new(folder.join(CACHE_DIR).join(stage))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn exists(&self, key: &Fingerprint) -> bool {
        self.path_for(key).is_file()
    }

    pub fn load<T: DeserializeOwned>(&self, key: &Fingerprint) -> Result<T, CacheError> {
        read_artifact(&self.path_for(key))
    }

    pub fn store<T: Serialize + ?Sized>(
        &self,
        key: &Fingerprint,
        artifact: &T,
    ) -> Result<(), CacheError> {
        write_artifact(&self.path_for(key), artifact)
    }
}
