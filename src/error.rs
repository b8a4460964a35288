//! Error taxonomy shared by every analysis stage.

use std::fmt;

use crate::config::ConfigError;

/// Category of a rejected input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidKind {
    /// `date` + `time` did not parse into a timestamp.
    Timestamp,
    /// `kw` was empty, non-numeric, or not finite.
    Numeric,
}

impl fmt::Display for InvalidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp => f.write_str("timestamp"),
            Self::Numeric => f.write_str("kw"),
        }
    }
}

/// Fieldless discriminant of [`AnalysisError`] for programmatic branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    DataQuality,
    EmptyResult,
    FactorRange,
    Config,
    Io,
}

impl ErrorKind {
    /// Process exit code used by the binary for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Schema => 2,
            Self::DataQuality => 3,
            Self::EmptyResult => 4,
            Self::FactorRange => 5,
            Self::Config => 6,
            Self::Io => 7,
        }
    }
}

/// Any failure that aborts an analysis run.
///
/// Raised at the stage boundary where it is detected; no stage continues
/// past another stage's failure and no partial report is produced.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("schema error: header \"{found}\" is not \"meter,date,time,kw\" or \"date,time,kw\"")]
    Schema { found: String },

    #[error(
        "data quality error: {count} rows with invalid {kind} exceed the tolerance of {threshold} \
         (first at line {first_line})"
    )]
    DataQuality {
        kind: InvalidKind,
        count: usize,
        threshold: usize,
        first_line: u64,
    },

    #[error("empty result: aggregation produced zero buckets from {valid_readings} valid readings")]
    EmptyResult { valid_readings: usize },

    #[error("factor range error: {factor} = {value} violates {constraint}")]
    FactorRange {
        factor: &'static str,
        value: f64,
        constraint: &'static str,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } => ErrorKind::Schema,
            Self::DataQuality { .. } => ErrorKind::DataQuality,
            Self::EmptyResult { .. } => ErrorKind::EmptyResult,
            Self::FactorRange { .. } => ErrorKind::FactorRange,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Csv(_) => ErrorKind::Io,
        }
    }
}
