//! Assembles stages into a chain and runs them in order.
//!
//! The process owns the output folder layout:
//!
//! ```text
//! <folder>/
//!   metadata.json          one per successful run
//!   logfile.log            recreated by the CLI on every run
//!   {order}_{Name}.json    whole-stage artifacts
//!   {order}_{Name}/        files a stage writes itself
//!   .cache/{Name}/         per-item artifacts
//! ```

pub mod metadata;

pub use metadata::{RunMetadata, METADATA_FILE};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::cache::store::ensure_directory;
use crate::config::Mode;
use crate::corpus::{expand_tilde, Source};
use crate::error::{FtisError, Result, StageError};
use crate::stage::{Stage, StageData, StageState};

pub const LOG_FILE: &str = "logfile.log";

pub struct Process {
    source: Source,
    folder: PathBuf,
    mode: Mode,
    workers: usize,
    chain: Vec<Stage>,
    metadata: RunMetadata,
}

impl Process {
    pub fn new(source: impl Into<Source>, folder: impl AsRef<Path>, mode: Mode) -> Self {
        let source = source.into();
        let metadata = RunMetadata::new(source.describe(), mode);
        Self {
            source,
            folder: expand_tilde(folder),
            mode,
            workers: num_cpus::get(),
            chain: Vec::new(),
            metadata,
        }
    }

    /// Worker count handed to every stage; at least 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Appends stages to the chain, numbering them from the current length.
    pub fn add(&mut self, stages: impl IntoIterator<Item = Stage>) -> &mut Self {
        for mut stage in stages {
            stage.set_order(self.chain.len());
            stage.set_output(&self.folder);
            self.metadata.record(&stage);
            self.chain.push(stage);
        }
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stages(&self) -> &[Stage] {
        &self.chain
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Executes every stage in order and writes `metadata.json`.
    ///
    /// The first failing stage stops the run; later stages stay pending and
    /// no metadata is written.
    pub fn run(&mut self) -> Result<()> {
        let _span = info_span!(
            "process",
            run_id = %self.metadata.run_id,
            mode = %self.mode,
            stages = self.chain.len()
        )
        .entered();

        ensure_directory(&self.folder)?;
        self.report_changes();

        let source = Arc::new(self.source.data());
        info!(
            source = %self.metadata.source,
            entries = source.len(),
            workers = self.workers,
            "starting run"
        );

        let mut previous: Option<Arc<StageData>> = None;
        for stage in self.chain.iter_mut() {
            let input = match (self.mode, stage.order()) {
                (Mode::Parallel, _) | (Mode::Chain, 0) => Arc::clone(&source),
                (Mode::Chain, _) => previous.clone().ok_or_else(|| StageError::MissingInput {
                    stage: stage.name().to_string(),
                })?,
            };
            stage.set_input(input);

            stage
                .execute(self.workers)
                .map_err(|e| FtisError::StageFailed {
                    order: stage.order(),
                    name: stage.name().to_string(),
                    source: Box::new(e),
                })?;
            previous = stage.output().cloned();
        }

        let path = self.metadata.write(&self.folder)?;
        let skipped = self
            .chain
            .iter()
            .filter(|s| s.state() == StageState::Skipped)
            .count();
        info!(
            metadata = %path.display(),
            skipped,
            ran = self.chain.len() - skipped,
            "run complete"
        );
        Ok(())
    }

    fn report_changes(&self) {
        match RunMetadata::read(&self.folder) {
            Ok(Some(previous)) => {
                for key in self.metadata.changed_stages(&previous) {
                    info!(stage = key, "configuration differs from the previous run");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring unreadable previous metadata: {}", e),
        }
    }
}
