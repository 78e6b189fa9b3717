use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::params::Overrides;

/// A pipeline description: which analysers run, in what order, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_worker_count")]
    pub workers: usize,
    pub chain: Vec<String>,
    /// Per-analyser option overrides; a bare `Name:` entry means "all defaults".
    #[serde(default)]
    pub analysers: BTreeMap<String, Option<Overrides>>,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Config {
    pub fn overrides_for(&self, analyser: &str) -> Overrides {
        self.analysers
            .get(analyser)
            .cloned()
            .flatten()
            .unwrap_or_default()
    }
}

/// How stage inputs are wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Each stage consumes the previous stage's output.
    #[default]
    Chain,
    /// Every stage consumes the pipeline source.
    Parallel,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Chain => f.write_str("chain"),
            Mode::Parallel => f.write_str("parallel"),
        }
    }
}
