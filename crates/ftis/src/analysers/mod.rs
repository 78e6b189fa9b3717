pub mod external;
pub mod path_loader;
pub mod scaling;
pub mod segmentation;
pub mod stats;

pub use external::{group_by_label, BatchModel, Extract, Fit, ItemAnalysis, ItemRender, Render};
pub use path_loader::PathLoader;
pub use scaling::{Normalise, Standardise};
pub use segmentation::{ClusteredSegmentation, SegmentLabeler};
pub use stats::{Statistic, Stats};

use crate::error::ConfigError;
use crate::stage::Analyser;

/// Analysers that can be built from their name alone.
pub const BUILTIN: &[&str] = &["PathLoader", "Stats", "Normalise", "Standardise"];

pub fn builtin(name: &str) -> Result<Box<dyn Analyser>, ConfigError> {
    match name {
        "PathLoader" => Ok(Box::new(PathLoader)),
        "Stats" => Ok(Box::new(Stats)),
        "Normalise" => Ok(Box::new(Normalise)),
        "Standardise" => Ok(Box::new(Standardise)),
        other => Err(ConfigError::UnknownAnalyser(other.to_string())),
    }
}
