//! Interval-metered load-profile analysis.
//!
//! Validates raw meter readings, aggregates them into a fixed-width load
//! profile, derives load/diversity/coincidence factors and classifies time
//! spent in transformer capacity bands.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod observability;
pub mod report;
pub mod synth;

#[cfg(feature = "api")]
pub mod api;
