use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FtisError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Stage {order} ({name}) failed: {source}")]
    StageFailed {
        order: usize,
        name: String,
        #[source]
        source: Box<FtisError>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No corpus source was provided")]
    NoCorpusSource,

    #[error("Corpus source '{0}' does not exist")]
    InvalidSource(PathBuf),

    #[error("Failed to scan '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid parameter '{name}' for {stage}: {reason}")]
    InvalidParameter {
        stage: String,
        name: String,
        reason: String,
    },

    #[error("Unknown analyser: {0}")]
    UnknownAnalyser(String),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache artifact '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to read cache artifact '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single item that did not produce a result during a parallel dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub key: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{stage}: item '{key}' failed: {source}")]
    ItemFailed {
        stage: String,
        key: String,
        #[source]
        source: Box<FtisError>,
    },

    #[error(
        "{stage}: parallel dispatch incomplete ({} failed, {} missing)",
        .failed.len(),
        .missing.len()
    )]
    Incomplete {
        stage: String,
        failed: Vec<ItemFailure>,
        missing: Vec<String>,
    },

    #[error("{stage}: batch analysis failed: {source}")]
    BatchFailed {
        stage: String,
        #[source]
        source: Box<FtisError>,
    },

    #[error("{stage}: item '{key}' received more than one result")]
    DuplicateKey { stage: String, key: String },

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{stage}: expected {expected} input, found {found}")]
    InputMismatch {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{stage}: no input has been wired")]
    MissingInput { stage: String },

    #[error("{stage}: output location has not been set")]
    OutputNotSet { stage: String },

    #[error("{stage}: {message}")]
    Analysis { stage: String, message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn analysis(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FtisError>;
