//! Shared utilities for ftis integration tests.
//!
//! - `TestHarness` gives each test its own corpus and output folders
//! - `analyses` holds small item analyses that count their calls

pub mod analyses;
pub mod harness;

pub use analyses::*;
pub use harness::TestHarness;
