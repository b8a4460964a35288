//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::ErrorKind;

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Optional per-request overrides for `POST /analyze`.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub rated_kva: Option<f64>,
    pub interval_minutes: Option<i64>,
    pub datetime: Option<String>,
}

impl AnalyzeQuery {
    /// Base configuration with this request's overrides applied.
    pub fn apply(self, base: &RunConfig) -> RunConfig {
        let mut cfg = base.clone();
        if let Some(kva) = self.rated_kva {
            cfg.analysis.rated_kva = Some(kva);
        }
        if let Some(minutes) = self.interval_minutes {
            cfg.analysis.interval_minutes = minutes;
        }
        if self.datetime.is_some() {
            cfg.analysis.target_datetime = self.datetime;
        }
        cfg
    }
}

/// Error body returned with 4xx/5xx status codes.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Programmatic error category; absent for internal failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub error: String,
}
