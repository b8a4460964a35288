//! Load-profile analysis stages.
//!
//! Validator -> aggregator -> factor calculator -> capacity classifier, with
//! the supplementary peak analyses last. [`Pipeline`] wires them together.

pub mod aggregate;
pub mod capacity;
pub mod engine;
pub mod factors;
pub mod observer;
pub mod peaks;
pub mod types;
pub mod validate;

pub use capacity::{CapacityBand, CapacityReport};
pub use engine::{Analysis, Pipeline};
pub use factors::{Factor, FactorReport, FactorSet, Peak};
pub use observer::{NullObserver, Observer, Stage, TracingObserver};
pub use peaks::{Amperage, PeakDetails, TargetAnalysis};
pub use types::{Bucket, GapSummary, InputSchema, LoadProfile, Reading, ReadingSet};
