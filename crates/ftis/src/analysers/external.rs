//! Seams for analysis code that lives outside this crate.
//!
//! Feature extraction, model fitting and audio rendering are supplied by the
//! caller through these traits. The wrappers turn them into stages with the
//! right dispatch strategy and caching.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ParameterSchema, Parameters};
use crate::corpus::WorkItem;
use crate::dispatch::ItemDispatch;
use crate::error::{Result, StageError};
use crate::stage::{Analyser, Feature, StageContext, StageData};

/// Computes one feature per audio item.
pub trait ItemAnalysis: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    /// Analyses that share a non thread-safe resource return `Sequential`.
    fn dispatch(&self) -> ItemDispatch {
        ItemDispatch::Parallel
    }

    fn analyse(&self, item: &WorkItem, params: &Parameters) -> Result<Feature>;
}

/// Fits one model over every feature at once (reduction, clustering, ...).
pub trait BatchModel {
    fn name(&self) -> &str;

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    fn fit(
        &mut self,
        features: &BTreeMap<String, Feature>,
        params: &Parameters,
    ) -> Result<StageData>;
}

/// Writes derived audio files for one item.
pub trait ItemRender: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    /// Returns the files written into `out_dir`.
    fn render(
        &self,
        item: &WorkItem,
        out_dir: &Path,
        params: &Parameters,
    ) -> Result<Vec<PathBuf>>;
}

/// Per-item feature extraction with item-level caching.
pub struct Extract<A> {
    analysis: A,
}

impl<A: ItemAnalysis> Extract<A> {
    pub fn new(analysis: A) -> Self {
        Self { analysis }
    }

    pub fn inner(&self) -> &A {
        &self.analysis
    }
}

impl<A: ItemAnalysis> Analyser for Extract<A> {
    fn name(&self) -> &str {
        self.analysis.name()
    }

    fn schema(&self) -> ParameterSchema {
        self.analysis.schema()
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let items = input.expect_items(ctx.name())?;
        let params = ctx.parameters();
        let analysis = &self.analysis;

        let features = ctx.map_items(analysis.dispatch(), items, |item| {
            analysis.analyse(item, params)
        })?;
        Ok(StageData::Features(features))
    }
}

/// A whole-batch model over a feature map.
pub struct Fit<M> {
    model: M,
}

impl<M: BatchModel> Fit<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }
}

impl<M: BatchModel> Analyser for Fit<M> {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn schema(&self) -> ParameterSchema {
        self.model.schema()
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let features = input.expect_features(ctx.name())?;
        let model = &mut self.model;
        ctx.whole_batch(|| model.fit(features, ctx.parameters()))
    }
}

/// Groups item keys by cluster label, in key order within each cluster.
pub fn group_by_label(stage: &str, keys: &[String], labels: &[i64]) -> Result<StageData> {
    if keys.len() != labels.len() {
        return Err(StageError::analysis(
            stage,
            format!("{} labels for {} items", labels.len(), keys.len()),
        )
        .into());
    }

    let mut clusters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, label) in keys.iter().zip(labels) {
        clusters.entry(label.to_string()).or_default().push(key.clone());
    }
    for members in clusters.values_mut() {
        members.sort();
    }
    Ok(StageData::Clusters(clusters))
}

/// Parallel rendering of derived files into the stage's output directory.
pub struct Render<R> {
    renderer: R,
}

impl<R: ItemRender> Render<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }
}

impl<R: ItemRender> Analyser for Render<R> {
    fn name(&self) -> &str {
        self.renderer.name()
    }

    fn schema(&self) -> ParameterSchema {
        self.renderer.schema()
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let items = input.expect_items(ctx.name())?;
        let out_dir = ctx.output_dir()?;
        let params = ctx.parameters();
        let renderer = &self.renderer;

        let rendered = ctx
            .parallel(items, |item: &WorkItem| renderer.render(item, &out_dir, params))?
            .into_complete()?;

        // Source order, then the order each item's files were written
        let mut derived = Vec::new();
        for item in items {
            for path in rendered.get(item.key()).into_iter().flatten() {
                derived.push(WorkItem::from_path(path)?);
            }
        }
        Ok(StageData::Items(derived))
    }
}
