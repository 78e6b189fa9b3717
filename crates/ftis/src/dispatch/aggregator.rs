use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::DispatchError;

/// Key-partitioned result map for one dispatch.
///
/// Workers send their outcomes over the pool's result channel; `parallel`
/// merges them here after the join. Inserts take `&self`, so the map can also
/// be filled from several threads at once.
///
/// Each key may be written once. A second write means the same item produced
/// two results, which is reported rather than overwritten.
#[derive(Debug)]
pub struct ResultAggregator<T> {
    stage: String,
    inner: Mutex<BTreeMap<String, T>>,
}

impl<T> ResultAggregator<T> {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: T) -> Result<(), DispatchError> {
        let key = key.into();
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&key) {
            return Err(DispatchError::DuplicateKey {
                stage: self.stage.clone(),
                key,
            });
        }
        map.insert(key, value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands the merged map to the owning stage once every writer is done.
    pub fn into_inner(self) -> BTreeMap<String, T> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
