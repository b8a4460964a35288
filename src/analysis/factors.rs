//! Factor calculator: peak, average, and the utility engineering ratios.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::observer::{Observer, Stage};
use super::types::{InputSchema, LoadProfile, ReadingSet};
use crate::error::AnalysisError;

/// Relative tolerance for `coincidence_factor * diversity_factor == 1`.
pub const RECIPROCITY_TOLERANCE: f64 = 1e-9;

/// A ratio that is either computed or cannot be known from the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Factor {
    Value(f64),
    Indeterminate,
}

impl Factor {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Indeterminate => None,
        }
    }
}

impl Serialize for Factor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Indeterminate => serializer.serialize_str("indeterminate"),
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.4}"),
            Self::Indeterminate => f.write_str("indeterminate"),
        }
    }
}

/// The four ratios reported for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorSet {
    /// `average_load / peak_load`.
    pub load_factor: f64,
    /// `sum_individual_maximum_demands / peak_load`.
    pub diversity_factor: Factor,
    /// `peak_load / sum_individual_maximum_demands`.
    pub coincidence_factor: Factor,
    /// Needs the total connected load, which interval data does not carry.
    pub demand_factor: Factor,
}

/// System peak: the largest bucket total and where it occurred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub timestamp: NaiveDateTime,
    pub kw: f64,
}

/// Everything the factor calculator derives from one profile.
#[derive(Debug, Clone, Serialize)]
pub struct FactorReport {
    pub peak: Peak,
    /// Mean of bucket totals (kW).
    pub average_load_kw: f64,
    /// Per-meter maximum reading (kW); empty in single-series mode.
    pub individual_maximum_demands: BTreeMap<String, f64>,
    pub sum_individual_maximum_demands: Option<f64>,
    pub meter_count: usize,
    /// Mean of each meter's mean reading (kW).
    pub average_load_per_meter_kw: Option<f64>,
    /// `sum_individual_maximum_demands / meter_count` (kW).
    pub average_peak_per_meter_kw: Option<f64>,
    pub factors: FactorSet,
}

#[derive(Default)]
struct MeterStats {
    max_kw: f64,
    sum_kw: f64,
    count: usize,
}

/// First bucket holding the largest total.
pub fn find_peak(profile: &LoadProfile) -> Option<Peak> {
    let mut peak: Option<Peak> = None;
    for b in profile.buckets() {
        if peak.is_none_or(|p| b.total_kw > p.kw) {
            peak = Some(Peak {
                timestamp: b.bucket_start,
                kw: b.total_kw,
            });
        }
    }
    peak
}

fn range_error(factor: &'static str, value: f64, constraint: &'static str) -> AnalysisError {
    AnalysisError::FactorRange {
        factor,
        value,
        constraint,
    }
}

impl FactorReport {
    /// Computes peak, averages, individual maxima and the factor set.
    ///
    /// Individual maxima come from the raw readings, not the profile, since
    /// a meter's own peak may fall in a different bucket than the system peak.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::FactorRange` when any of these fail:
    /// `peak_load > 0`, `0 < coincidence_factor < 1`, `diversity_factor > 1`,
    /// `0 < load_factor < 1`, and `coincidence_factor == 1 / diversity_factor`
    /// within [`RECIPROCITY_TOLERANCE`].
    pub fn from_profile(
        profile: &LoadProfile,
        set: &ReadingSet,
        observer: &dyn Observer,
    ) -> Result<Self, AnalysisError> {
        let peak = match find_peak(profile) {
            Some(p) if p.kw > 0.0 => p,
            other => {
                let kw = other.map_or(0.0, |p| p.kw);
                return Err(range_error("peak_load", kw, "peak_load > 0"));
            }
        };

        let average_load_kw = profile.total_kw() / profile.len() as f64;

        let mut per_meter: HashMap<Arc<str>, MeterStats> = HashMap::new();
        if set.schema == InputSchema::MultiMeter {
            for r in &set.readings {
                let Some(id) = &r.meter_id else { continue };
                let stats = per_meter.entry(Arc::clone(id)).or_insert_with(|| MeterStats {
                    max_kw: r.load_kw,
                    ..MeterStats::default()
                });
                stats.max_kw = stats.max_kw.max(r.load_kw);
                stats.sum_kw += r.load_kw;
                stats.count += 1;
            }
        }

        let individual_maximum_demands: BTreeMap<String, f64> = per_meter
            .iter()
            .map(|(id, s)| (id.to_string(), s.max_kw))
            .collect();
        let meter_count = per_meter.len();

        let (sum_max, avg_per_meter, avg_peak_per_meter) = if meter_count > 0 {
            // Summed in meter-id order so repeated runs agree bit for bit.
            let sum: f64 = individual_maximum_demands.values().sum();
            let mut means: Vec<(&Arc<str>, f64)> = per_meter
                .iter()
                .map(|(id, s)| (id, s.sum_kw / s.count as f64))
                .collect();
            means.sort_by(|a, b| a.0.cmp(b.0));
            let mean_of_means =
                means.iter().map(|(_, m)| m).sum::<f64>() / meter_count as f64;
            (
                Some(sum),
                Some(mean_of_means),
                Some(sum / meter_count as f64),
            )
        } else {
            (None, None, None)
        };

        let load_factor = average_load_kw / peak.kw;
        let (coincidence_factor, diversity_factor) = match sum_max {
            Some(sum) => (Factor::Value(peak.kw / sum), Factor::Value(sum / peak.kw)),
            None => (Factor::Indeterminate, Factor::Indeterminate),
        };

        let factors = FactorSet {
            load_factor,
            diversity_factor,
            coincidence_factor,
            demand_factor: Factor::Indeterminate,
        };
        check_ranges(&factors, observer)?;
        observer.stage_completed(Stage::Factors, 4);

        Ok(Self {
            peak,
            average_load_kw,
            individual_maximum_demands,
            sum_individual_maximum_demands: sum_max,
            meter_count,
            average_load_per_meter_kw: avg_per_meter,
            average_peak_per_meter_kw: avg_peak_per_meter,
            factors,
        })
    }
}

/// Domain sanity checks. Negated comparisons so NaN fails too.
fn check_ranges(factors: &FactorSet, observer: &dyn Observer) -> Result<(), AnalysisError> {
    if let (Factor::Value(cf), Factor::Value(df)) =
        (factors.coincidence_factor, factors.diversity_factor)
    {
        if !(cf > 0.0 && cf < 1.0) {
            return Err(range_error("coincidence_factor", cf, "0 < coincidence_factor < 1"));
        }
        observer.check_passed("coincidence_factor", cf);

        if !(df > 1.0) {
            return Err(range_error("diversity_factor", df, "diversity_factor > 1"));
        }
        observer.check_passed("diversity_factor", df);
    }

    let lf = factors.load_factor;
    if !(lf > 0.0 && lf < 1.0) {
        return Err(range_error("load_factor", lf, "0 < load_factor < 1"));
    }
    observer.check_passed("load_factor", lf);

    if let (Factor::Value(cf), Factor::Value(df)) =
        (factors.coincidence_factor, factors.diversity_factor)
    {
        let rel = (cf - 1.0 / df).abs() / cf.abs();
        if !(rel <= RECIPROCITY_TOLERANCE) {
            return Err(range_error(
                "coincidence_factor",
                cf,
                "coincidence_factor == 1 / diversity_factor",
            ));
        }
        observer.check_passed("reciprocity", rel);
    }
    Ok(())
}
