pub mod analyser;
pub mod context;
pub mod data;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::cache::{fingerprint, read_artifact, write_artifact, Fingerprint};
use crate::config::{validate_parameters, Overrides, Parameters};
use crate::error::{CacheError, ConfigError, Result, StageError};

pub use analyser::Analyser;
pub use context::StageContext;
pub use data::{Feature, StageData};

/// Where a stage is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    /// A valid artifact was loaded; `run` was never called.
    Skipped,
    Running,
    Done,
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageState::Pending => "pending",
            StageState::Skipped => "skipped",
            StageState::Running => "running",
            StageState::Done => "done",
            StageState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why an existing artifact no longer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleCause {
    Parameters,
    Input,
}

impl fmt::Display for StaleCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleCause::Parameters => f.write_str("parameters"),
            StaleCause::Input => f.write_str("input"),
        }
    }
}

/// What the whole-stage artifact location holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheProbe {
    /// An artifact written from the current input under the current configuration.
    Hit(StageData),
    Miss,
    Stale {
        cause: StaleCause,
        expected: Fingerprint,
        found: Fingerprint,
    },
}

/// On-disk envelope around a stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageArtifact<D> {
    pub stage: String,
    pub order: usize,
    /// Digest of the configuration alone.
    pub config: Fingerprint,
    /// Digest of the wired input under the configuration.
    pub input: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub output: D,
}

/// One element of a chain: an analyser with its resolved parameters, its
/// wired input, and its output once executed.
pub struct Stage {
    analyser: Box<dyn Analyser>,
    name: String,
    order: usize,
    parameters: Parameters,
    config_identity: String,
    input: Option<Arc<StageData>>,
    output: Option<Arc<StageData>>,
    output_path: Option<PathBuf>,
    folder: Option<PathBuf>,
    state: StageState,
}

impl Stage {
    pub fn new(analyser: impl Analyser + 'static) -> Self {
        Self::from_boxed(Box::new(analyser))
    }

    /// A stage with the analyser's declared defaults.
    pub fn from_boxed(analyser: Box<dyn Analyser>) -> Self {
        let name = analyser.name().to_string();
        let parameters = Parameters::defaults(&name, &analyser.schema());
        let config_identity = parameters.config_identity(&name);

        Self {
            analyser,
            name,
            order: 0,
            parameters,
            config_identity,
            input: None,
            output: None,
            output_path: None,
            folder: None,
            state: StageState::Pending,
        }
    }

    /// Resolves `overrides` against the analyser's schema.
    pub fn with_overrides(
        mut self,
        overrides: &Overrides,
    ) -> std::result::Result<Self, ConfigError> {
        self.parameters = validate_parameters(&self.name, &self.analyser.schema(), overrides)?;
        self.config_identity = self.parameters.config_identity(&self.name);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn cache_enabled(&self) -> bool {
        self.parameters.cache_enabled()
    }

    pub fn config_identity(&self) -> &str {
        &self.config_identity
    }

    pub fn config_fingerprint(&self) -> Fingerprint {
        Fingerprint::of_config(&self.config_identity)
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn input(&self) -> Option<&Arc<StageData>> {
        self.input.as_ref()
    }

    pub fn set_input(&mut self, input: Arc<StageData>) {
        self.input = Some(input);
    }

    pub fn output(&self) -> Option<&Arc<StageData>> {
        self.output.as_ref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Fixes the artifact location to `{folder}/{order}_{name}.json`.
    pub fn set_output(&mut self, folder: &Path) -> PathBuf {
        let path = folder.join(format!("{}_{}.json", self.order, self.name));
        self.folder = Some(folder.to_path_buf());
        self.output_path = Some(path.clone());
        path
    }

    /// Key of the artifact this stage would write for its wired input.
    pub fn input_fingerprint(&self) -> Result<Fingerprint> {
        let input = self.input.as_deref().ok_or_else(|| StageError::MissingInput {
            stage: self.name.clone(),
        })?;
        let identity = serde_json::to_string(input).map_err(CacheError::from)?;
        Ok(fingerprint(&identity, &self.config_identity))
    }

    fn require_output_path(&self) -> std::result::Result<&Path, StageError> {
        self.output_path
            .as_deref()
            .ok_or_else(|| StageError::OutputNotSet {
                stage: self.name.clone(),
            })
    }

    /// Looks at the artifact location without changing the stage.
    ///
    /// An artifact that cannot be parsed is an error, not a miss. Comparing
    /// inputs needs the input wired.
    pub fn probe_cache(&self) -> Result<CacheProbe> {
        let path = self.require_output_path()?;
        if !path.is_file() {
            return Ok(CacheProbe::Miss);
        }

        let artifact: StageArtifact<StageData> = read_artifact(path)?;
        let expected = self.config_fingerprint();
        if artifact.config != expected {
            return Ok(CacheProbe::Stale {
                cause: StaleCause::Parameters,
                expected,
                found: artifact.config,
            });
        }

        let expected = self.input_fingerprint()?;
        if artifact.input != expected {
            return Ok(CacheProbe::Stale {
                cause: StaleCause::Input,
                expected,
                found: artifact.input,
            });
        }

        Ok(CacheProbe::Hit(artifact.output))
    }

    /// Writes the current output to the artifact location.
    pub fn dump(&self) -> Result<PathBuf> {
        let path = self.require_output_path()?;
        let output = self
            .output
            .as_deref()
            .ok_or_else(|| StageError::analysis(&self.name, "no output to write"))?;

        let artifact = StageArtifact {
            stage: self.name.clone(),
            order: self.order,
            config: self.config_fingerprint(),
            input: self.input_fingerprint()?,
            created_at: Utc::now(),
            output,
        };
        write_artifact(path, &artifact)?;
        debug!(stage = %self.name, path = %path.display(), "output written");
        Ok(path.to_path_buf())
    }

    /// Replaces the output with the stored artifact if it matches the current
    /// configuration and input. Returns whether it did.
    pub fn load_cache(&mut self) -> Result<bool> {
        match self.probe_cache()? {
            CacheProbe::Hit(data) => {
                self.output = Some(Arc::new(data));
                Ok(true)
            }
            CacheProbe::Miss | CacheProbe::Stale { .. } => Ok(false),
        }
    }

    /// Runs the analyser on the wired input, replacing any previous output.
    pub fn run(&mut self, workers: usize) -> Result<()> {
        let folder = self.folder.clone().ok_or_else(|| StageError::OutputNotSet {
            stage: self.name.clone(),
        })?;
        let input = self.input.clone().ok_or_else(|| StageError::MissingInput {
            stage: self.name.clone(),
        })?;

        let ctx = StageContext::new(
            &self.name,
            self.order,
            &folder,
            &self.parameters,
            &self.config_identity,
            workers,
        );
        let output = self.analyser.run(&ctx, &input)?;
        self.output = Some(Arc::new(output));
        Ok(())
    }

    /// The single entry point per stage: load a valid artifact when `cache`
    /// is on, otherwise run and write the output.
    pub fn execute(&mut self, workers: usize) -> Result<()> {
        let _span = info_span!("stage", order = self.order, name = %self.name).entered();

        let result = self.execute_inner(workers);
        if result.is_err() {
            self.state = StageState::Failed;
        }
        result
    }

    fn execute_inner(&mut self, workers: usize) -> Result<()> {
        if self.cache_enabled() {
            match self.probe_cache()? {
                CacheProbe::Hit(data) => {
                    info!(stage = %self.name, "loaded from cache, skipping run");
                    self.output = Some(Arc::new(data));
                    self.state = StageState::Skipped;
                    return Ok(());
                }
                CacheProbe::Stale {
                    cause,
                    expected,
                    found,
                } => {
                    warn!(
                        stage = %self.name,
                        %cause,
                        %expected,
                        %found,
                        "cached output no longer matches, re-running"
                    );
                }
                CacheProbe::Miss => {}
            }
        }

        self.state = StageState::Running;
        self.run(workers)?;
        self.dump()?;
        self.state = StageState::Done;

        let produced = self.output.as_ref().map(|o| o.len()).unwrap_or(0);
        info!(stage = %self.name, entries = produced, "stage done");
        Ok(())
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("parameters", &self.parameters)
            .field("state", &self.state)
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}
