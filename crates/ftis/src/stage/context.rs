use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::{fingerprint, CacheStore, Fingerprint};
use crate::config::Parameters;
use crate::corpus::WorkItem;
use crate::dispatch::{self, DispatchReport, ItemDispatch, Keyed};
use crate::error::{Result, StageError};

/// Everything an analyser may use while it runs.
///
/// The context owns the per-item cache for the stage. Workers only ever see
/// the analysis closure; reads happen before dispatch and writes after the join.
pub struct StageContext<'a> {
    name: &'a str,
    order: usize,
    folder: &'a Path,
    parameters: &'a Parameters,
    config_identity: &'a str,
    workers: usize,
    item_cache: CacheStore,
}

impl<'a> StageContext<'a> {
    pub fn new(
        name: &'a str,
        order: usize,
        folder: &'a Path,
        parameters: &'a Parameters,
        config_identity: &'a str,
        workers: usize,
    ) -> Self {
        Self {
            name,
            order,
            folder,
            parameters,
            config_identity,
            workers: workers.max(1),
            item_cache: CacheStore::for_stage(folder, name),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn folder(&self) -> &Path {
        self.folder
    }

    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn item_cache(&self) -> &CacheStore {
        &self.item_cache
    }

    /// `{folder}/{order}_{name}`, created on first use.
    pub fn output_dir(&self) -> Result<PathBuf> {
        let dir = self.folder.join(format!("{}_{}", self.order, self.name));
        std::fs::create_dir_all(&dir).map_err(|e| StageError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    pub fn fingerprint(&self, item: &WorkItem) -> Fingerprint {
        fingerprint(&item.identity(), self.config_identity)
    }

    pub fn whole_batch<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        Ok(dispatch::whole_batch(self.name, f)?)
    }

    pub fn sequential<I, T, F>(&self, items: &[I], f: F) -> Result<BTreeMap<String, T>>
    where
        I: Keyed,
        F: FnMut(&I) -> Result<T>,
    {
        Ok(dispatch::sequential(self.name, items, f)?)
    }

    /// Parallel dispatch that hands back the full report instead of failing.
    pub fn parallel<I, T, F>(&self, items: &[I], f: F) -> Result<DispatchReport<T>>
    where
        I: Keyed + Sync,
        T: Send,
        F: Fn(&I) -> Result<T> + Sync,
    {
        Ok(dispatch::parallel(self.name, items, self.workers, f)?)
    }

    /// Per-item analysis backed by the item cache.
    ///
    /// With `cache` on, items whose artifact exists are loaded instead of
    /// computed; a corrupt artifact fails the stage. Every computed result is
    /// stored, so a later run with `cache` on can reuse it.
    pub fn map_items<T, F>(
        &self,
        mode: ItemDispatch,
        items: &[WorkItem],
        f: F,
    ) -> Result<BTreeMap<String, T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn(&WorkItem) -> Result<T> + Sync,
    {
        let mut results = BTreeMap::new();
        let mut misses = Vec::new();

        for item in items {
            let key = self.fingerprint(item);
            if self.parameters.cache_enabled() && self.item_cache.exists(&key) {
                let value: T = self.item_cache.load(&key)?;
                results.insert(item.key().to_string(), value);
            } else {
                misses.push((item, key));
            }
        }

        debug!(
            stage = %self.name,
            hits = results.len(),
            misses = misses.len(),
            "item cache probed"
        );

        let computed = dispatch::map_items(
            self.name,
            mode,
            &misses,
            self.workers,
            |(item, _): &(&WorkItem, Fingerprint)| f(*item),
        )?;

        for (item, key) in &misses {
            if let Some(value) = computed.get(item.key()) {
                self.item_cache.store(key, value)?;
            }
        }

        results.extend(computed);
        Ok(results)
    }
}
