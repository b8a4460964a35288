//! Supplementary peak analyses: amperage, target-instant load, no-load intervals.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::factors::Peak;
use super::observer::{Observer, Stage};
use super::types::{Bucket, LoadProfile, ReadingSet};

/// Single-phase current at unity power factor for one voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Amperage {
    pub volts: f64,
    pub amps: f64,
}

/// `amps = kW * 1000 / V` for each voltage.
pub fn amperages(kw: f64, voltages: &[f64]) -> Vec<Amperage> {
    voltages
        .iter()
        .map(|&volts| Amperage {
            volts,
            amps: kw * 1000.0 / volts,
        })
        .collect()
}

/// Load at a requested instant and the largest bucket on that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetAnalysis {
    Found {
        target: NaiveDateTime,
        /// Sum of readings stamped exactly at `target` (kW).
        coincident_kw: f64,
        coincident_amperage: Vec<Amperage>,
        /// Largest bucket starting on the target's calendar date.
        non_coincident_peak: Option<Peak>,
    },
    OutsideDataset {
        target: NaiveDateTime,
    },
}

impl TargetAnalysis {
    pub fn target(&self) -> NaiveDateTime {
        match self {
            Self::Found { target, .. } | Self::OutsideDataset { target } => *target,
        }
    }
}

/// Evaluates the target instant against the raw readings and the profile.
///
/// A target with no reading stamped exactly at it is `OutsideDataset`.
pub fn analyze_target(
    target: NaiveDateTime,
    set: &ReadingSet,
    profile: &LoadProfile,
    voltages: &[f64],
) -> TargetAnalysis {
    let mut hits = 0usize;
    let mut coincident_kw = 0.0;
    for r in set.readings.iter().filter(|r| r.timestamp == target) {
        hits += 1;
        coincident_kw += r.load_kw;
    }
    if hits == 0 {
        return TargetAnalysis::OutsideDataset { target };
    }

    let day = target.date();
    let mut non_coincident_peak: Option<Peak> = None;
    for b in profile
        .buckets()
        .iter()
        .filter(|b| b.bucket_start.date() == day)
    {
        if non_coincident_peak.is_none_or(|p| b.total_kw > p.kw) {
            non_coincident_peak = Some(Peak {
                timestamp: b.bucket_start,
                kw: b.total_kw,
            });
        }
    }

    TargetAnalysis::Found {
        target,
        coincident_kw,
        coincident_amperage: amperages(coincident_kw, voltages),
        non_coincident_peak,
    }
}

/// Buckets below `threshold_kw`, in chronological order.
pub fn no_load_intervals(profile: &LoadProfile, threshold_kw: f64) -> Vec<Bucket> {
    profile
        .buckets()
        .iter()
        .filter(|b| b.total_kw < threshold_kw)
        .copied()
        .collect()
}

/// Everything the supplementary analyses produce for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakDetails {
    pub peak_amperage: Vec<Amperage>,
    pub target: Option<TargetAnalysis>,
    pub no_load_threshold_kw: f64,
    pub no_load: Vec<Bucket>,
}

impl PeakDetails {
    pub fn compute(
        peak: &Peak,
        set: &ReadingSet,
        profile: &LoadProfile,
        target: Option<NaiveDateTime>,
        voltages: &[f64],
        no_load_threshold_kw: f64,
        observer: &dyn Observer,
    ) -> Self {
        let target = target.map(|t| analyze_target(t, set, profile, voltages));
        if let Some(TargetAnalysis::OutsideDataset { .. }) = &target {
            observer.stage_skipped(Stage::Peaks, "target datetime outside dataset");
        }
        let no_load = no_load_intervals(profile, no_load_threshold_kw);
        observer.stage_completed(Stage::Peaks, no_load.len());
        Self {
            peak_amperage: amperages(peak.kw, voltages),
            target,
            no_load_threshold_kw,
            no_load,
        }
    }
}
