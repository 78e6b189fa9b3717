use std::collections::BTreeMap;

use crate::config::ParameterSchema;
use crate::error::{ConfigError, Result, StageError};
use crate::stage::{Analyser, Feature, StageContext, StageData};

/// Flattens every feature into a row, requiring one shared width.
fn feature_rows(stage: &str, features: &BTreeMap<String, Feature>) -> Result<Vec<Vec<f64>>> {
    let rows: Vec<Vec<f64>> = features.values().map(Feature::flatten).collect();
    if let Some(width) = rows.first().map(Vec::len) {
        if let Some((key, row)) = features.keys().zip(&rows).find(|(_, r)| r.len() != width) {
            return Err(StageError::analysis(
                stage,
                format!("'{}' has {} values, expected {}", key, row.len(), width),
            )
            .into());
        }
    }
    Ok(rows)
}

/// Applies `scale(column)` to every column and reassembles the feature map.
fn scale_columns<F, G>(
    stage: &str,
    features: &BTreeMap<String, Feature>,
    scale: F,
) -> Result<BTreeMap<String, Feature>>
where
    F: Fn(&[f64]) -> G,
    G: Fn(f64) -> f64,
{
    let mut rows = feature_rows(stage, features)?;
    let width = rows.first().map(Vec::len).unwrap_or(0);

    for col in 0..width {
        let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
        let f = scale(&column);
        for row in rows.iter_mut() {
            row[col] = f(row[col]);
        }
    }

    Ok(features
        .keys()
        .cloned()
        .zip(rows.into_iter().map(Feature::Vector))
        .collect())
}

/// Min-max scaling of each dimension into `[minimum, maximum]`.
///
/// A dimension with a single distinct value maps to `minimum`.
#[derive(Debug, Default)]
pub struct Normalise;

impl Analyser for Normalise {
    fn name(&self) -> &str {
        "Normalise"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .float("minimum", 0.0)
            .float("maximum", 1.0)
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let lower = ctx.parameters().float("minimum")?;
        let upper = ctx.parameters().float("maximum")?;
        if lower > upper {
            return Err(ConfigError::InvalidParameter {
                stage: ctx.name().to_string(),
                name: "minimum".to_string(),
                reason: format!("{} is greater than maximum {}", lower, upper),
            }
            .into());
        }

        let features = input.expect_features(ctx.name())?;
        ctx.whole_batch(|| {
            let scaled = scale_columns(ctx.name(), features, |column| {
                let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = hi - lo;
                move |x: f64| {
                    if range > 0.0 {
                        (x - lo) / range * (upper - lower) + lower
                    } else {
                        lower
                    }
                }
            })?;
            Ok(StageData::Features(scaled))
        })
    }
}

/// Scales each dimension to zero mean and unit (population) variance.
///
/// A dimension with zero variance maps to 0.
#[derive(Debug, Default)]
pub struct Standardise;

impl Analyser for Standardise {
    fn name(&self) -> &str {
        "Standardise"
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let features = input.expect_features(ctx.name())?;
        ctx.whole_batch(|| {
            let scaled = scale_columns(ctx.name(), features, |column| {
                let n = column.len() as f64;
                let mean = column.iter().sum::<f64>() / n;
                let var = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                move |x: f64| if std > 0.0 { (x - mean) / std } else { 0.0 }
            })?;
            Ok(StageData::Features(scaled))
        })
    }
}
