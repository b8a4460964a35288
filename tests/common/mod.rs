//! Shared test fixtures for integration tests.

use load_profile::analysis::{Analysis, NullObserver, Pipeline};
use load_profile::config::{DemoConfig, RunConfig};
use load_profile::error::AnalysisError;
use load_profile::synth;

/// Two meters, four 15-minute intervals each.
///
/// Bucket totals 13, 25, 23, 6; individual maxima 10 (a) and 20 (b).
pub const TWO_METER_CSV: &str = "\
meter,date,time,kw
a,2024-08-04,00:00:00,5
b,2024-08-04,00:00:00,8
a,2024-08-04,00:15:00,10
b,2024-08-04,00:15:00,15
a,2024-08-04,00:30:00,3
b,2024-08-04,00:30:00,20
a,2024-08-04,00:45:00,2
b,2024-08-04,00:45:00,4
";

/// Builds a single-series CSV with one reading per 15 minutes from midnight.
pub fn single_series_csv(values: &[f64]) -> String {
    let mut csv = String::from("date,time,kw\n");
    for (i, kw) in values.iter().enumerate() {
        let minutes = i * 15;
        csv.push_str(&format!(
            "2024-08-04,{:02}:{:02}:00,{kw}\n",
            minutes / 60,
            minutes % 60
        ));
    }
    csv
}

/// Default configuration with the given rated capacity.
pub fn config_with_capacity(rated_kva: Option<f64>) -> RunConfig {
    let mut cfg = RunConfig::default();
    cfg.analysis.rated_kva = rated_kva;
    cfg
}

/// Runs the full pipeline over an in-memory CSV.
pub fn run(csv: &str, cfg: RunConfig) -> Result<Analysis, AnalysisError> {
    Pipeline::new(cfg, NullObserver)?.run(csv.as_bytes())
}

/// Small seeded multi-meter demo dataset as CSV text.
pub fn demo_csv(seed: u64) -> String {
    sized_demo_csv(seed, 5, 2)
}

/// Seeded multi-meter demo dataset with the given extent.
pub fn sized_demo_csv(seed: u64, meters: usize, days: usize) -> String {
    let cfg = DemoConfig {
        meters,
        days,
        seed,
        ..DemoConfig::default()
    };
    let mut buf = Vec::new();
    let written = synth::write_demo_csv(&cfg, &mut buf);
    assert!(written.is_ok(), "demo generation failed: {written:?}");
    String::from_utf8(buf).unwrap_or_default()
}
