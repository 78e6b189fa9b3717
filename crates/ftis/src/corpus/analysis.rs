use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;
use serde_json::Value;

use crate::corpus::loader::expand_tilde;
use crate::error::ConfigError;
use crate::stage::data::Feature;

/// A previously written feature file used as the pipeline source.
///
/// The file is a JSON object mapping item keys to a number, a list of
/// numbers, or a list of rows.
#[derive(Debug, Clone)]
pub struct Analysis {
    path: PathBuf,
    features: BTreeMap<String, Feature>,
}

impl Analysis {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = path.as_ref();
        if raw.as_os_str().is_empty() {
            return Err(ConfigError::NoCorpusSource);
        }

        let path = expand_tilde(raw);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::InvalidSource(path));
            }
            Err(e) => {
                return Err(ConfigError::ReadFile { path, source: e });
            }
        };

        let features = Self::parse(&content)?;
        info!(
            "Loaded {} analysed items from {}",
            features.len(),
            path.display()
        );

        Ok(Self { path, features })
    }

    pub fn parse(content: &str) -> Result<BTreeMap<String, Feature>, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(entries) = value else {
            return Err(ConfigError::Validation {
                message: "analysis file must be a JSON object".to_string(),
            });
        };

        entries
            .into_iter()
            .map(|(key, value)| {
                Feature::from_json(&value)
                    .map(|feature| (key.clone(), feature))
                    .ok_or_else(|| ConfigError::Validation {
                        message: format!("entry '{}' is not a number, vector or matrix", key),
                    })
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn features(&self) -> &BTreeMap<String, Feature> {
        &self.features
    }
}
