use std::collections::BTreeMap;

use crate::config::ParameterSchema;
use crate::error::{ConfigError, Result};
use crate::stage::{Analyser, Feature, StageContext, StageData};

/// One summary statistic of a row of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    StdDev,
    Skewness,
    Kurtosis,
    Min,
    Median,
    Max,
}

impl Statistic {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mean" => Some(Statistic::Mean),
            "stddev" => Some(Statistic::StdDev),
            "skewness" => Some(Statistic::Skewness),
            "kurtosis" => Some(Statistic::Kurtosis),
            "min" | "minimum" => Some(Statistic::Min),
            "median" => Some(Statistic::Median),
            "max" | "maximum" => Some(Statistic::Max),
            _ => None,
        }
    }
}

/// Central moments of a row, computed once and shared by every statistic.
struct Moments {
    n: f64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

impl Moments {
    fn of(row: &[f64]) -> Self {
        let n = row.len() as f64;
        let mean = row.iter().sum::<f64>() / n;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for x in row {
            let d = x - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }
        Self {
            n,
            mean,
            m2: m2 / n,
            m3: m3 / n,
            m4: m4 / n,
        }
    }
}

/// Computes `spec` over `row`, in the order given.
///
/// The standard deviation uses the sample (n - 1) variance. Skewness and
/// excess kurtosis are the biased moment estimators. Where a statistic is
/// undefined (an empty or constant row) the value is 0.
pub fn describe(row: &[f64], spec: &[Statistic]) -> Vec<f64> {
    if row.is_empty() {
        return vec![0.0; spec.len()];
    }

    let moments = Moments::of(row);
    let mut sorted = row.to_vec();
    sorted.sort_by(f64::total_cmp);

    spec.iter()
        .map(|stat| match stat {
            Statistic::Mean => moments.mean,
            Statistic::StdDev if moments.n > 1.0 => {
                (moments.m2 * moments.n / (moments.n - 1.0)).sqrt()
            }
            Statistic::StdDev => 0.0,
            Statistic::Skewness if moments.m2 > 0.0 => moments.m3 / moments.m2.powf(1.5),
            Statistic::Kurtosis if moments.m2 > 0.0 => {
                moments.m4 / (moments.m2 * moments.m2) - 3.0
            }
            Statistic::Skewness | Statistic::Kurtosis => 0.0,
            Statistic::Min => sorted[0],
            Statistic::Median => median(&sorted),
            Statistic::Max => sorted[sorted.len() - 1],
        })
        .collect()
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// First difference of `row`; one element shorter.
pub fn diff(row: &[f64]) -> Vec<f64> {
    row.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Summary statistics of each feature row and of its successive differences.
///
/// Each row yields the statistics of the row itself followed by those of its
/// first `numderivs` differences. With `flatten` the rows are concatenated
/// into one vector.
#[derive(Debug, Default)]
pub struct Stats;

impl Stats {
    fn row_stats(row: &[f64], numderivs: usize, spec: &[Statistic]) -> Vec<f64> {
        let mut out = describe(row, spec);
        let mut current = row.to_vec();
        for _ in 0..numderivs {
            current = diff(&current);
            out.extend(describe(&current, spec));
        }
        out
    }
}

impl Analyser for Stats {
    fn name(&self) -> &str {
        "Stats"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .integer("numderivs", 0)
            .bool("flatten", true)
            .text_list(
                "spec",
                &["mean", "stddev", "skewness", "kurtosis", "min", "median", "max"],
            )
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let params = ctx.parameters();
        let numderivs = params.count("numderivs")?;
        let flatten = params.bool("flatten")?;
        let spec = params
            .text_list("spec")?
            .iter()
            .map(|name| {
                Statistic::parse(name).ok_or_else(|| ConfigError::InvalidParameter {
                    stage: ctx.name().to_string(),
                    name: "spec".to_string(),
                    reason: format!("unknown statistic '{}'", name),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let features = input.expect_features(ctx.name())?;
        let entries: Vec<(&String, &Feature)> = features.iter().collect();

        let stats: BTreeMap<String, Feature> = ctx.sequential(&entries, |(_, feature)| {
            let rows: Vec<Vec<f64>> = feature
                .rows()
                .into_iter()
                .map(|row| Self::row_stats(row, numderivs, &spec))
                .collect();
            Ok(if flatten {
                Feature::Vector(rows.concat())
            } else {
                Feature::Matrix(rows)
            })
        })?;

        Ok(StageData::Features(stats))
    }
}
