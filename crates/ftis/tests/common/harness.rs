//! Isolated corpus and output folders for pipeline tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use ftis::corpus::Corpus;
use ftis::process::{RunMetadata, METADATA_FILE};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Folder holding the audio files.
    pub corpus_dir: PathBuf,
    /// Folder a process writes into. Not created up front.
    pub output_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let corpus = temp_dir.child("corpus");
        corpus.create_dir_all().expect("Failed to create corpus dir");

        let corpus_dir = corpus.path().to_path_buf();
        let output_dir = temp_dir.child("output").path().to_path_buf();

        Self {
            temp_dir,
            corpus_dir,
            output_dir,
        }
    }

    /// A harness whose corpus holds `names`, each `size` bytes long.
    pub fn with_items(names: &[&str], size: usize) -> Self {
        let harness = Self::new();
        for name in names {
            harness.write_item(name, &vec![0u8; size]);
        }
        harness
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_item(&self, filename: &str, content: &[u8]) -> PathBuf {
        let item = self.temp_dir.child("corpus").child(filename);
        item.write_binary(content).expect("Failed to write corpus item");
        item.path().to_path_buf()
    }

    pub fn write_config(&self, yaml: &str) -> PathBuf {
        let config = self.temp_dir.child("pipeline.yaml");
        config.write_str(yaml).expect("Failed to write config");
        config.path().to_path_buf()
    }

    pub fn corpus(&self) -> Corpus {
        Corpus::load(&self.corpus_dir).expect("Failed to load corpus")
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn metadata(&self) -> Option<RunMetadata> {
        let path = self.output_file(METADATA_FILE);
        path.is_file().then(|| {
            let raw = std::fs::read_to_string(&path).expect("Failed to read metadata");
            serde_json::from_str(&raw).expect("Failed to parse metadata")
        })
    }

    /// Files under the output folder's item cache for `stage`.
    pub fn cached_items(&self, stage: &str) -> usize {
        let dir = self.output_dir.join(".cache").join(stage);
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
