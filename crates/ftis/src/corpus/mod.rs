pub mod analysis;
pub mod item;
pub mod loader;

pub use analysis::Analysis;
pub use item::WorkItem;
pub use loader::{expand_tilde, scan_directory, Corpus, AUDIO_EXTENSIONS};

use crate::stage::data::StageData;

/// Where the first stage (and, in parallel mode, every stage) reads from.
#[derive(Debug, Clone)]
pub enum Source {
    Corpus(Corpus),
    Analysis(Analysis),
}

impl Source {
    pub fn data(&self) -> StageData {
        match self {
            Source::Corpus(corpus) => StageData::Items(corpus.items().to_vec()),
            Source::Analysis(analysis) => StageData::Features(analysis.features().clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::Corpus(corpus) => corpus.path().display().to_string(),
            Source::Analysis(analysis) => analysis.path().display().to_string(),
        }
    }
}

impl From<Corpus> for Source {
    fn from(corpus: Corpus) -> Self {
        Source::Corpus(corpus)
    }
}

impl From<Analysis> for Source {
    fn from(analysis: Analysis) -> Self {
        Source::Analysis(analysis)
    }
}
