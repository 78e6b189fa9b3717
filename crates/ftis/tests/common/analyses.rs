//! Item analyses used across the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ftis::config::{ParameterSchema, Parameters};
use ftis::corpus::WorkItem;
use ftis::dispatch::ItemDispatch;
use ftis::error::{Result, StageError};
use ftis::stage::Feature;
use ftis::ItemAnalysis;

/// Emits `[len * scale]` for each item and counts how often it ran.
#[derive(Clone, Default)]
pub struct ByteLength {
    pub calls: Arc<AtomicUsize>,
    pub dispatch: Option<ItemDispatch>,
}

impl ByteLength {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequential() -> Self {
        Self {
            dispatch: Some(ItemDispatch::Sequential),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ItemAnalysis for ByteLength {
    fn name(&self) -> &str {
        "ByteLength"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().float("scale", 1.0)
    }

    fn dispatch(&self) -> ItemDispatch {
        self.dispatch.unwrap_or(ItemDispatch::Parallel)
    }

    fn analyse(&self, item: &WorkItem, params: &Parameters) -> Result<Feature> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scale = params.float("scale")?;
        Ok(Feature::Vector(vec![item.len() as f64 * scale, 1.0]))
    }
}

/// Fails on any item whose file name contains `needle`.
pub struct FailOn {
    pub needle: &'static str,
}

impl ItemAnalysis for FailOn {
    fn name(&self) -> &str {
        "FailOn"
    }

    fn analyse(&self, item: &WorkItem, _params: &Parameters) -> Result<Feature> {
        if item.key().contains(self.needle) {
            let message = format!("cannot decode {}", item.key());
            return Err(StageError::analysis("FailOn", message).into());
        }
        Ok(Feature::Scalar(item.len() as f64))
    }
}

/// Emits NaN and infinity for items named like silence, as extractors do on
/// empty frames.
pub struct Silence;

impl ItemAnalysis for Silence {
    fn name(&self) -> &str {
        "Silence"
    }

    fn analyse(&self, item: &WorkItem, _params: &Parameters) -> Result<Feature> {
        if item.key().contains("silent") {
            return Ok(Feature::Vector(vec![f64::NAN, f64::INFINITY]));
        }
        Ok(Feature::Vector(vec![item.len() as f64, 1.0]))
    }
}
