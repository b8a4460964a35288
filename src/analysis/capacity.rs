//! Capacity classifier: time spent in transformer utilization bands.

use std::fmt;

use serde::Serialize;

use super::observer::{Observer, Stage};
use super::types::LoadProfile;

/// Utilization band; edges are half-open `[low, high)`, the top band is `[120, ∞)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityBand {
    #[serde(rename = "below_85")]
    Below85,
    #[serde(rename = "between_85_100")]
    Between85And100,
    #[serde(rename = "between_100_120")]
    Between100And120,
    #[serde(rename = "above_120")]
    Above120,
}

impl CapacityBand {
    pub const ALL: [Self; 4] = [
        Self::Below85,
        Self::Between85And100,
        Self::Between100And120,
        Self::Above120,
    ];

    /// Band holding a load expressed as percent of rated capacity.
    pub fn classify(load_pct: f64) -> Self {
        if load_pct < 85.0 {
            Self::Below85
        } else if load_pct < 100.0 {
            Self::Between85And100
        } else if load_pct < 120.0 {
            Self::Between100And120
        } else {
            Self::Above120
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Below85 => "Below 85%",
            Self::Between85And100 => "Between 85% and 100%",
            Self::Between100And120 => "Between 100% and 120%",
            Self::Above120 => "Exceeds 120%",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Below85 => 0,
            Self::Between85And100 => 1,
            Self::Between100And120 => 2,
            Self::Above120 => 3,
        }
    }
}

impl fmt::Display for CapacityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accumulated time in one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandDuration {
    pub band: CapacityBand,
    pub label: &'static str,
    pub bucket_count: usize,
    pub hours: f64,
    pub days: f64,
    /// Share of total elapsed time (%).
    pub percent: f64,
}

/// Absolute load thresholds (kW at PF = 1) for the band edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandThresholds {
    pub pct_85_kw: f64,
    pub pct_100_kw: f64,
    pub pct_120_kw: f64,
}

/// Capacity distribution for one rated capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    pub rated_kva: f64,
    pub total_elapsed_hours: f64,
    pub total_elapsed_days: f64,
    pub thresholds: BandThresholds,
    /// One entry per band in [`CapacityBand::ALL`] order.
    pub bands: Vec<BandDuration>,
}

impl CapacityReport {
    pub fn band(&self, band: CapacityBand) -> Option<&BandDuration> {
        self.bands.iter().find(|b| b.band == band)
    }
}

/// Classifies every bucket against `rated_kva`.
///
/// `rated_kva` is the already validated rating from
/// [`AnalysisConfig::rated_capacity`](crate::config::AnalysisConfig::rated_capacity):
/// `None` skips the analysis, otherwise it is positive and finite.
/// Percentages are relative to [`LoadProfile::elapsed_hours`], which for a
/// single bucket is the interval width rather than zero.
pub fn classify(
    profile: &LoadProfile,
    rated_kva: Option<f64>,
    observer: &dyn Observer,
) -> Option<CapacityReport> {
    let Some(rated_kva) = rated_kva else {
        observer.stage_skipped(Stage::Capacity, "rated capacity not supplied or zero");
        return None;
    };

    let mut counts = [0usize; 4];
    for b in profile.buckets() {
        let load_pct = b.total_kw * 100.0 / rated_kva;
        counts[CapacityBand::classify(load_pct).index()] += 1;
    }

    let interval_hours = profile.interval_hours();
    let total_hours = profile.elapsed_hours();
    let bands = CapacityBand::ALL
        .iter()
        .map(|&band| {
            let bucket_count = counts[band.index()];
            let hours = bucket_count as f64 * interval_hours;
            BandDuration {
                band,
                label: band.label(),
                bucket_count,
                hours,
                days: hours / 24.0,
                percent: hours / total_hours * 100.0,
            }
        })
        .collect();

    observer.stage_completed(Stage::Capacity, CapacityBand::ALL.len());

    Some(CapacityReport {
        rated_kva,
        total_elapsed_hours: total_hours,
        total_elapsed_days: total_hours / 24.0,
        thresholds: BandThresholds {
            pct_85_kw: rated_kva * 0.85,
            pct_100_kw: rated_kva,
            pct_120_kw: rated_kva * 1.2,
        },
        bands,
    })
}
