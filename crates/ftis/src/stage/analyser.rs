use crate::config::ParameterSchema;
use crate::error::Result;
use crate::stage::context::StageContext;
use crate::stage::data::StageData;

/// One pipeline step.
///
/// An analyser declares its options through [`Analyser::schema`], receives
/// the resolved values in the [`StageContext`], and turns its input into an
/// output. Which dispatch strategy it uses is its own choice; the context
/// provides all three.
pub trait Analyser {
    /// Stage name, used for output locations, cache directories and metadata.
    fn name(&self) -> &str;

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData>;
}

impl<A: Analyser + ?Sized> Analyser for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn schema(&self) -> ParameterSchema {
        (**self).schema()
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        (**self).run(ctx, input)
    }
}
