use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{read_artifact, write_artifact};
use crate::config::{Mode, CACHE};
use crate::error::CacheError;
use crate::stage::Stage;

pub const METADATA_FILE: &str = "metadata.json";

/// What a run was asked to do: its source, its chain and every stage's
/// resolved parameters. Written once, after the last stage succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub time: String,
    pub source: String,
    pub mode: Mode,
    /// Stage names in execution order.
    pub io: Vec<String>,
    /// `"{order}_{name}"` to resolved parameters, without `cache`.
    pub analyser: BTreeMap<String, BTreeMap<String, Value>>,
}

impl RunMetadata {
    pub fn new(source: impl Into<String>, mode: Mode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            time: chrono::Local::now()
                .format("%H:%M:%S | %B %d, %Y")
                .to_string(),
            source: source.into(),
            mode,
            io: Vec::new(),
            analyser: BTreeMap::new(),
        }
    }

    pub fn path(folder: &Path) -> PathBuf {
        folder.join(METADATA_FILE)
    }

    /// Snapshots a stage's configuration as it is at assembly time.
    pub fn record(&mut self, stage: &Stage) {
        let params = stage
            .parameters()
            .values()
            .iter()
            .filter(|(name, _)| name.as_str() != CACHE)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        self.io.push(stage.name().to_string());
        self.analyser
            .insert(format!("{}_{}", stage.order(), stage.name()), params);
    }

    /// The metadata of the previous run in `folder`, if there was one.
    pub fn read(folder: &Path) -> Result<Option<Self>, CacheError> {
        let path = Self::path(folder);
        if !path.is_file() {
            return Ok(None);
        }
        read_artifact(&path).map(Some)
    }

    pub fn write(&self, folder: &Path) -> Result<PathBuf, CacheError> {
        let path = Self::path(folder);
        write_artifact(&path, self)?;
        Ok(path)
    }

    /// Stages that are new or whose parameters differ from `previous`.
    pub fn changed_stages<'a>(&'a self, previous: &RunMetadata) -> Vec<&'a str> {
        self.analyser
            .iter()
            .filter(|(key, params)| previous.analyser.get(*key) != Some(*params))
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysers::{Normalise, Stats};
    use crate::config::Overrides;
    use serde_json::json;
    use tempfile::TempDir;

    fn stage_at(order: usize, stage: Stage) -> Stage {
        let mut stage = stage;
        stage.set_order(order);
        stage
    }

    #[test]
    fn test_record_excludes_cache() {
        let overrides: Overrides =
            serde_json::from_value(json!({"numderivs": 2, "cache": true})).unwrap();
        let stage = Stage::new(Stats).with_overrides(&overrides).unwrap();

        let mut meta = RunMetadata::new("/corpus", Mode::Chain);
        meta.record(&stage_at(0, stage));

        assert_eq!(meta.io, vec!["Stats"]);
        let params = &meta.analyser["0_Stats"];
        assert_eq!(params["numderivs"], json!(2));
        assert!(!params.contains_key("cache"));
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        assert!(RunMetadata::read(temp_dir.path()).unwrap().is_none());

        let mut meta = RunMetadata::new("/corpus", Mode::Parallel);
        meta.record(&stage_at(0, Stage::new(Normalise)));
        let path = meta.write(temp_dir.path()).unwrap();
        assert!(path.ends_with(METADATA_FILE));

        let back = RunMetadata::read(temp_dir.path()).unwrap().unwrap();
        assert_eq!(back, meta);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["mode"], "parallel");
        assert_eq!(raw["analyser"]["0_Normalise"]["maximum"], json!(1.0));
    }

    #[test]
    fn test_changed_stages() {
        let mut before = RunMetadata::new("/corpus", Mode::Chain);
        before.record(&stage_at(0, Stage::new(Stats)));
        before.record(&stage_at(1, Stage::new(Normalise)));

        let overrides: Overrides = serde_json::from_value(json!({"maximum": 10.0})).unwrap();
        let mut after = RunMetadata::new("/corpus", Mode::Chain);
        after.record(&stage_at(0, Stage::new(Stats)));
        after.record(&stage_at(
            1,
            Stage::new(Normalise).with_overrides(&overrides).unwrap(),
        ));

        assert_eq!(after.changed_stages(&before), vec!["1_Normalise"]);
        assert!(before.changed_stages(&before).is_empty());
        assert_ne!(before.run_id, after.run_id);
    }
}
