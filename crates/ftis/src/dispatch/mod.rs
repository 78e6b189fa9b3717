//! The three ways a stage applies its work to a collection of items.
//!
//! - [`whole_batch`]: a single call over the entire input.
//! - [`sequential`]: one item at a time in input order. The first failing
//!   item aborts the stage.
//! - [`parallel`]: a fixed-size worker pool. Every worker is joined before
//!   any result is read, and the returned [`DispatchReport`] names every item
//!   that failed or never produced a result.

pub mod aggregator;
mod pool;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info_span, warn};

use crate::corpus::WorkItem;
use crate::error::{DispatchError, ItemFailure, Result};

pub use aggregator::ResultAggregator;

/// Anything that can be dispatched: it must name the key its result is stored under.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for WorkItem {
    fn key(&self) -> &str {
        WorkItem::key(self)
    }
}

impl Keyed for String {
    fn key(&self) -> &str {
        self
    }
}

impl<T: Keyed + ?Sized> Keyed for &T {
    fn key(&self) -> &str {
        (**self).key()
    }
}

/// A pair is keyed by its first element, e.g. `(key, feature)`.
impl<K: Keyed, V> Keyed for (K, V) {
    fn key(&self) -> &str {
        self.0.key()
    }
}

/// How a per-item stage spreads its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemDispatch {
    Sequential,
    Parallel,
}

/// Runs `f` once over the whole input. Any failure fails the stage.
pub fn whole_batch<T, F>(stage: &str, f: F) -> std::result::Result<T, DispatchError>
where
    F: FnOnce() -> Result<T>,
{
    let _span = info_span!("dispatch.batch", stage = %stage).entered();
    f().map_err(|e| DispatchError::BatchFailed {
        stage: stage.to_string(),
        source: Box::new(e),
    })
}

/// Runs `f` on each item in order, stopping at the first failure.
pub fn sequential<I, T, F>(
    stage: &str,
    items: &[I],
    mut f: F,
) -> std::result::Result<BTreeMap<String, T>, DispatchError>
where
    I: Keyed,
    F: FnMut(&I) -> Result<T>,
{
    let _span = info_span!("dispatch.sequential", stage = %stage, items = items.len()).entered();
    let mut results = BTreeMap::new();

    for item in items {
        let key = item.key();
        if results.contains_key(key) {
            return Err(DispatchError::DuplicateKey {
                stage: stage.to_string(),
                key: key.to_string(),
            });
        }

        let value = f(item).map_err(|e| DispatchError::ItemFailed {
            stage: stage.to_string(),
            key: key.to_string(),
            source: Box::new(e),
        })?;
        results.insert(key.to_string(), value);
    }

    Ok(results)
}

/// Outcome of a parallel dispatch once every worker has been joined.
#[derive(Debug)]
pub struct DispatchReport<T> {
    pub stage: String,
    pub results: BTreeMap<String, T>,
    pub failures: Vec<ItemFailure>,
    /// Keys that never received a result (e.g. their worker could not start).
    pub missing: Vec<String>,
}

impl<T> DispatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.missing.is_empty()
    }

    /// The result map, or an error listing every failed and missing key.
    pub fn into_complete(self) -> std::result::Result<BTreeMap<String, T>, DispatchError> {
        if self.is_complete() {
            Ok(self.results)
        } else {
            Err(DispatchError::Incomplete {
                stage: self.stage,
                failed: self.failures,
                missing: self.missing,
            })
        }
    }
}

/// Runs `f` on every item across `workers` threads.
///
/// `workers` is clamped to `1..=items.len()`. Item keys must be unique; a
/// repeated key is rejected before any work starts.
pub fn parallel<I, T, F>(
    stage: &str,
    items: &[I],
    workers: usize,
    f: F,
) -> std::result::Result<DispatchReport<T>, DispatchError>
where
    I: Keyed + Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    let workers = workers.clamp(1, items.len().max(1));
    let _span = info_span!(
        "dispatch.parallel",
        stage = %stage,
        items = items.len(),
        workers = workers
    )
    .entered();

    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item.key()) {
            return Err(DispatchError::DuplicateKey {
                stage: stage.to_string(),
                key: item.key().to_string(),
            });
        }
    }

    let outcomes = if items.is_empty() {
        Vec::new()
    } else {
        pool::run_pool(stage, items, workers, &f)?
    };

    // Every worker has joined; merge the channel's outcomes by key
    let aggregator = ResultAggregator::new(stage);
    let mut failures = Vec::new();
    for (index, outcome) in outcomes {
        let key = items[index].key();
        match outcome {
            Ok(value) => aggregator.insert(key, value)?,
            Err(message) => {
                warn!(stage = %stage, key = %key, "item failed: {}", message);
                failures.push(ItemFailure {
                    key: key.to_string(),
                    message,
                });
            }
        }
    }
    failures.sort_by(|a, b| a.key.cmp(&b.key));

    let missing: Vec<String> = items
        .iter()
        .map(Keyed::key)
        .filter(|key| {
            !aggregator.contains(key) && !failures.iter().any(|failure| failure.key == *key)
        })
        .map(str::to_string)
        .collect();

    let results = aggregator.into_inner();
    debug!(
        stage = %stage,
        done = results.len(),
        failed = failures.len(),
        missing = missing.len(),
        "parallel dispatch joined"
    );

    Ok(DispatchReport {
        stage: stage.to_string(),
        results,
        failures,
        missing,
    })
}

/// Per-item dispatch with either strategy, failing unless every item succeeded.
pub fn map_items<I, T, F>(
    stage: &str,
    mode: ItemDispatch,
    items: &[I],
    workers: usize,
    f: F,
) -> std::result::Result<BTreeMap<String, T>, DispatchError>
where
    I: Keyed + Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    match mode {
        ItemDispatch::Sequential => sequential(stage, items, f),
        ItemDispatch::Parallel => parallel(stage, items, workers, f)?.into_complete(),
    }
}
