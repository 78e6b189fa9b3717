use std::ops::Add;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::corpus::item::WorkItem;
use crate::error::{ConfigError, StageError};

/// Audio file extensions a corpus accepts unless told otherwise.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aiff", "aif"];

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

pub(crate) fn extension_matches(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Lists the files directly inside `directory` whose extension is allowed,
/// sorted by path so every run sees the same order.
pub fn scan_directory(
    directory: &Path,
    extensions: &[String],
) -> Result<Vec<WorkItem>, ConfigError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1) // Only the top level, derived folders live underneath
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ConfigError::ScanFailed {
            path: directory.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        if extension_matches(path, extensions) {
            debug!("Found item: {}", path.display());
            paths.push(path.to_path_buf());
        }
    }

    paths
        .iter()
        .map(|p| WorkItem::from_path(p).map_err(|e| stage_io_to_config(directory, e)))
        .collect()
}

fn stage_io_to_config(directory: &Path, error: StageError) -> ConfigError {
    match error {
        StageError::Io { path, .. } => ConfigError::InvalidSource(path),
        _ => ConfigError::InvalidSource(directory.to_path_buf()),
    }
}

/// The externally supplied collection of source items.
#[derive(Debug, Clone)]
pub struct Corpus {
    path: PathBuf,
    extensions: Vec<String>,
    items: Vec<WorkItem>,
}

impl Corpus {
    /// Loads every audio file at the top level of `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::with_extensions(path, AUDIO_EXTENSIONS)
    }

    pub fn with_extensions<P: AsRef<Path>>(
        path: P,
        extensions: &[&str],
    ) -> Result<Self, ConfigError> {
        let raw = path.as_ref();
        if raw.as_os_str().is_empty() {
            return Err(ConfigError::NoCorpusSource);
        }

        let path = expand_tilde(raw);
        if !path.is_dir() {
            return Err(ConfigError::InvalidSource(path));
        }
        let path = path
            .canonicalize()
            .map_err(|_| ConfigError::InvalidSource(path.clone()))?;

        let extensions: Vec<String> = extensions.iter().map(|e| e.to_string()).collect();
        let items = scan_directory(&path, &extensions)?;

        info!("Loaded {} corpus items from {}", items.len(), path.display());

        Ok(Self {
            path,
            extensions,
            items,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keeps only the items matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&WorkItem) -> bool,
    {
        self.items.retain(|item| predicate(item));
        self
    }

    /// Appends the items of `other`, skipping any key already present.
    pub fn merge(mut self, other: Corpus) -> Self {
        for item in other.items {
            if !self.items.iter().any(|i| i.key() == item.key()) {
                self.items.push(item);
            }
        }
        self
    }
}

impl Add for Corpus {
    type Output = Corpus;

    fn add(self, rhs: Corpus) -> Corpus {
        self.merge(rhs)
    }
}
