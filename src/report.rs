//! Summary report: structured sections rendered as text or JSON.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analysis::peaks::Amperage;
use crate::analysis::types::InvalidRowCounts;
use crate::analysis::{
    Analysis, CapacityReport, FactorSet, GapSummary, InputSchema, Peak, TargetAnalysis,
};

const RULE: &str =
    "================================================================================";
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Input identity, date range and row bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct DataParameters {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<NaiveDateTime>,
    pub schema: InputSchema,
    pub interval_minutes: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Whole days between start and end, plus one.
    pub days_in_dataset: i64,
    pub meters: usize,
    pub rows_read: usize,
    pub rows_dropped: InvalidRowCounts,
    pub gaps: GapSummary,
}

/// Load statistics of the run.
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    pub average_load_kw: f64,
    pub peak: Peak,
    pub peak_amperage: Vec<Amperage>,
    pub sum_individual_maximum_demands_kw: Option<f64>,
    pub average_load_per_meter_kw: Option<f64>,
    pub average_peak_per_meter_kw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetAnalysis>,
    pub no_load_threshold_kw: f64,
    pub no_load_intervals: usize,
}

/// The report handed to the caller after a successful run.
///
/// `capacity_distribution` is absent, not empty, when capacity analysis was
/// skipped.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub data_parameters: DataParameters,
    pub results: Results,
    pub calculated_factors: FactorSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_distribution: Option<CapacityReport>,
}

impl AnalysisReport {
    /// Collects the report sections from a finished analysis.
    pub fn from_analysis(input: &str, analysis: &Analysis) -> Self {
        let profile = &analysis.profile;
        let set = &analysis.readings;
        let f = &analysis.factors;
        let start = profile.data_start();
        let end = profile.data_end();

        Self {
            data_parameters: DataParameters {
                input: input.to_string(),
                generated_at: None,
                schema: set.schema,
                interval_minutes: profile.interval().num_minutes(),
                start,
                end,
                days_in_dataset: (end - start).num_days() + 1,
                meters: f.meter_count,
                rows_read: set.rows_read,
                rows_dropped: set.invalid,
                gaps: profile.gaps(),
            },
            results: Results {
                average_load_kw: f.average_load_kw,
                peak: f.peak,
                peak_amperage: analysis.peaks.peak_amperage.clone(),
                sum_individual_maximum_demands_kw: f.sum_individual_maximum_demands,
                average_load_per_meter_kw: f.average_load_per_meter_kw,
                average_peak_per_meter_kw: f.average_peak_per_meter_kw,
                target: analysis.peaks.target.clone(),
                no_load_threshold_kw: analysis.peaks.no_load_threshold_kw,
                no_load_intervals: analysis.peaks.no_load.len(),
            },
            calculated_factors: f.factors,
            capacity_distribution: analysis.capacity.clone(),
        }
    }

    /// Stamps the generation time shown in the data parameters.
    pub fn with_generated_at(mut self, at: NaiveDateTime) -> Self {
        self.data_parameters.generated_at = Some(at);
        self
    }

    /// Pretty-printed JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{RULE}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{RULE}")
}

fn optional_kw(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |kw| format!("{kw:.3} kW"))
}

fn write_amperage(f: &mut fmt::Formatter<'_>, label: &str, amps: &[Amperage]) -> fmt::Result {
    for a in amps {
        writeln!(f, "{:<34}{:.2} A", format!("{label} @ {} V:", a.volts), a.amps)?;
    }
    Ok(())
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data_parameters;
        section(f, "DATA PARAMETERS")?;
        writeln!(f, "{:<34}{}", "Input:", d.input)?;
        if let Some(at) = d.generated_at {
            writeln!(f, "{:<34}{}", "Generated at:", at.format(TS_FORMAT))?;
        }
        writeln!(f, "{:<34}{}", "Columns:", d.schema.columns().join(","))?;
        writeln!(f, "{:<34}{} min", "Interval:", d.interval_minutes)?;
        writeln!(f, "{:<34}{}", "Start:", d.start.format(TS_FORMAT))?;
        writeln!(f, "{:<34}{}", "End:", d.end.format(TS_FORMAT))?;
        writeln!(f, "{:<34}{}", "Days in dataset:", d.days_in_dataset)?;
        if d.schema == InputSchema::MultiMeter {
            writeln!(f, "{:<34}{}", "Meters:", d.meters)?;
        }
        writeln!(f, "{:<34}{}", "Rows read:", d.rows_read)?;
        writeln!(f, "{:<34}{}", "Rows dropped (timestamp):", d.rows_dropped.timestamp)?;
        writeln!(f, "{:<34}{}", "Rows dropped (kw):", d.rows_dropped.numeric)?;
        write!(f, "{:<34}{}", "Missing intervals:", d.gaps.missing_buckets)?;
        if let (Some(first), Some(last)) = (d.gaps.first_missing, d.gaps.last_missing) {
            write!(f, " ({} to {})", first.format(TS_FORMAT), last.format(TS_FORMAT))?;
        }
        writeln!(f)?;

        let r = &self.results;
        section(f, "RESULTS")?;
        writeln!(f, "{:<34}{:.3} kW", "Average load:", r.average_load_kw)?;
        writeln!(
            f,
            "{:<34}{:.3} kW at {}",
            "Peak load:",
            r.peak.kw,
            r.peak.timestamp.format(TS_FORMAT)
        )?;
        write_amperage(f, "Peak current", &r.peak_amperage)?;
        if d.schema == InputSchema::MultiMeter {
            writeln!(
                f,
                "{:<34}{}",
                "Sum of individual max demands:",
                optional_kw(r.sum_individual_maximum_demands_kw)
            )?;
            writeln!(
                f,
                "{:<34}{}",
                "Average load per meter:",
                optional_kw(r.average_load_per_meter_kw)
            )?;
            writeln!(
                f,
                "{:<34}{}",
                "Average peak per meter:",
                optional_kw(r.average_peak_per_meter_kw)
            )?;
        }
        match &r.target {
            Some(TargetAnalysis::Found {
                target,
                coincident_kw,
                coincident_amperage,
                non_coincident_peak,
            }) => {
                writeln!(f, "{:<34}{}", "Target datetime:", target.format(TS_FORMAT))?;
                writeln!(f, "{:<34}{coincident_kw:.3} kW", "Coincident load at target:")?;
                write_amperage(f, "Target current", coincident_amperage)?;
                if let Some(p) = non_coincident_peak {
                    writeln!(
                        f,
                        "{:<34}{:.3} kW at {}",
                        "Non-coincident peak on date:",
                        p.kw,
                        p.timestamp.format(TS_FORMAT)
                    )?;
                }
            }
            Some(TargetAnalysis::OutsideDataset { target }) => {
                writeln!(
                    f,
                    "{:<34}{} OUTSIDE OF DATASET",
                    "Target datetime:",
                    target.format(TS_FORMAT)
                )?;
            }
            None => {}
        }
        writeln!(
            f,
            "{:<34}{}",
            format!("No-load intervals (< {} kW):", r.no_load_threshold_kw),
            r.no_load_intervals
        )?;

        let c = &self.calculated_factors;
        section(f, "CALCULATED FACTORS")?;
        writeln!(f, "{:<34}{:.4}", "Load factor:", c.load_factor)?;
        writeln!(f, "{:<34}{}", "Diversity factor:", c.diversity_factor)?;
        writeln!(f, "{:<34}{}", "Coincidence factor:", c.coincidence_factor)?;
        write!(f, "{:<34}{}", "Demand factor:", c.demand_factor)?;

        if let Some(cap) = &self.capacity_distribution {
            writeln!(f)?;
            section(f, &format!("CAPACITY DISTRIBUTION ({} kVA)", cap.rated_kva))?;
            writeln!(f, "{:<34}{:.3} kW", "85% of rated:", cap.thresholds.pct_85_kw)?;
            writeln!(f, "{:<34}{:.3} kW", "100% of rated:", cap.thresholds.pct_100_kw)?;
            writeln!(f, "{:<34}{:.3} kW", "120% of rated:", cap.thresholds.pct_120_kw)?;
            writeln!(
                f,
                "{:<34}{:.2} days ({:.2} hours)",
                "Total elapsed:", cap.total_elapsed_days, cap.total_elapsed_hours
            )?;
            writeln!(f)?;
            writeln!(f, "{:<24}{:>12}{:>12}{:>12}", "LOAD RANGE", "DAYS", "HOURS", "%")?;
            for (i, b) in cap.bands.iter().enumerate() {
                write!(
                    f,
                    "{:<24}{:>12.2}{:>12.2}{:>12.2}",
                    b.label, b.days, b.hours, b.percent
                )?;
                if i + 1 < cap.bands.len() {
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}
