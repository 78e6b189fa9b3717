pub mod analysers;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod process;
pub mod stage;

pub use analysers::{builtin, BatchModel, Extract, Fit, ItemAnalysis, ItemRender, Render};
pub use cache::{fingerprint, CacheStore, Fingerprint};
pub use config::{load_config, Config, Mode, Overrides, ParameterSchema, Parameters};
pub use corpus::{Analysis, Corpus, Source, WorkItem};
pub use dispatch::{DispatchReport, ItemDispatch, ResultAggregator};
pub use error::{CacheError, ConfigError, DispatchError, FtisError, Result, StageError};
pub use process::{Process, RunMetadata};
pub use stage::{
    Analyser, CacheProbe, Feature, Stage, StageContext, StageData, StageState, StaleCause,
};
