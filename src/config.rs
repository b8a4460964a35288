//! TOML-based run configuration.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;

/// Top-level run configuration parsed from TOML.
///
/// All fields have defaults matching the standard 15-minute analysis. Load
/// from TOML with [`RunConfig::from_toml_file`] or use
/// [`RunConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Pipeline parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Report rendering parameters.
    #[serde(default)]
    pub report: ReportConfig,
    /// Synthetic dataset parameters for `--demo`.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Pipeline parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Bucket width in minutes (must be > 0).
    pub interval_minutes: i64,
    /// Largest tolerated number of invalid rows per category.
    pub max_invalid_rows: usize,
    /// Transformer rating (KVA). Absent or zero skips capacity analysis.
    pub rated_kva: Option<f64>,
    /// Instant for coincident/non-coincident peak lookup (`YYYY-MM-DD HH:MM:SS`).
    pub target_datetime: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            max_invalid_rows: 3,
            rated_kva: None,
            target_datetime: None,
        }
    }
}

/// Report rendering parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Buckets below this total (kW) are listed as no-load intervals.
    pub no_load_threshold_kw: f64,
    /// Line-to-neutral voltages for single-phase amperage (V).
    pub voltages: Vec<f64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            no_load_threshold_kw: 0.5,
            voltages: vec![120.0, 208.0, 240.0, 7200.0],
        }
    }
}

/// Synthetic multi-meter dataset parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Number of meters (must be > 0).
    pub meters: usize,
    /// Number of days (must be > 0).
    pub days: usize,
    /// Readings per meter per day (must be > 0).
    pub steps_per_day: usize,
    /// Master random seed.
    pub seed: u64,
    /// Mean per-meter load (kW).
    pub base_kw: f64,
    /// Daily sinusoidal amplitude (kW).
    pub amp_kw: f64,
    /// Phase shift between consecutive meters (radians).
    pub phase_step_rad: f64,
    /// Gaussian noise standard deviation (kW).
    pub noise_std: f64,
    /// First day of the dataset (`YYYY-MM-DD`).
    pub start_date: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            meters: 8,
            days: 7,
            steps_per_day: 96,
            seed: 42,
            base_kw: 2.0,
            amp_kw: 1.5,
            phase_step_rad: 0.6,
            noise_std: 0.3,
            start_date: "2024-08-04".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"analysis.interval_minutes"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Parses a `YYYY-MM-DD HH:MM:SS[.fff]` instant.
pub fn parse_target_datetime(s: &str) -> Result<NaiveDateTime, ConfigError> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f").map_err(|e| {
        ConfigError::new(
            "analysis.target_datetime",
            format!("\"{s}\" is not YYYY-MM-DD HH:MM:SS: {e}"),
        )
    })
}

impl AnalysisConfig {
    /// Bucket width as a duration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the width is non-positive or out of range.
    pub fn interval(&self) -> Result<TimeDelta, ConfigError> {
        if self.interval_minutes <= 0 {
            return Err(ConfigError::new(
                "analysis.interval_minutes",
                format!("must be > 0, got {}", self.interval_minutes),
            ));
        }
        TimeDelta::try_minutes(self.interval_minutes).ok_or_else(|| {
            ConfigError::new("analysis.interval_minutes", "is out of range")
        })
    }

    /// Rated capacity for the classifier, or `None` when analysis is skipped.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a negative or non-finite rating was supplied.
    pub fn rated_capacity(&self) -> Result<Option<f64>, ConfigError> {
        match self.rated_kva {
            None => Ok(None),
            Some(kva) if !kva.is_finite() || kva < 0.0 => Err(ConfigError::new(
                "analysis.rated_kva",
                format!("must be > 0 (or 0 to skip capacity analysis), got {kva}"),
            )),
            Some(kva) if kva == 0.0 => Ok(None),
            Some(kva) => Ok(Some(kva)),
        }
    }

    /// Parsed target instant, if one was configured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the string does not parse.
    pub fn target(&self) -> Result<Option<NaiveDateTime>, ConfigError> {
        self.target_datetime
            .as_deref()
            .map(parse_target_datetime)
            .transpose()
    }
}

impl DemoConfig {
    /// First day of the synthetic dataset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `start_date` is not `YYYY-MM-DD`.
    pub fn start(&self) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|e| {
            ConfigError::new(
                "demo.start_date",
                format!("\"{}\" is not YYYY-MM-DD: {e}", self.start_date),
            )
        })
    }
}

impl RunConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let a = &self.analysis;

        if let Err(e) = a.interval() {
            errors.push(e);
        }
        if let Err(e) = a.rated_capacity() {
            errors.push(e);
        }
        if let Err(e) = a.target() {
            errors.push(e);
        }

        let r = &self.report;
        if !r.no_load_threshold_kw.is_finite() {
            errors.push(ConfigError::new(
                "report.no_load_threshold_kw",
                "must be finite",
            ));
        }
        if r.voltages.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            errors.push(ConfigError::new("report.voltages", "every voltage must be > 0"));
        }

        let d = &self.demo;
        if d.meters == 0 {
            errors.push(ConfigError::new("demo.meters", "must be > 0"));
        }
        if d.days == 0 {
            errors.push(ConfigError::new("demo.days", "must be > 0"));
        }
        if d.steps_per_day == 0 {
            errors.push(ConfigError::new("demo.steps_per_day", "must be > 0"));
        }
        if d.noise_std < 0.0 {
            errors.push(ConfigError::new("demo.noise_std", "must be >= 0"));
        }
        if let Err(e) = d.start() {
            errors.push(e);
        }

        errors
    }
}
