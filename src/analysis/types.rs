//! Core analysis types: readings, validated sets, and the load profile.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

/// Column set detected from the input header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSchema {
    /// `meter,date,time,kw`: per-meter peaks and diversity are computable.
    MultiMeter,
    /// `date,time,kw`: a single aggregate series.
    SingleSeries,
}

impl InputSchema {
    /// Column names expected for this schema, in order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::MultiMeter => &["meter", "date", "time", "kw"],
            Self::SingleSeries => &["date", "time", "kw"],
        }
    }
}

/// One validated interval reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Meter identifier, `None` in single-series mode.
    pub meter_id: Option<Arc<str>>,
    pub timestamp: NaiveDateTime,
    /// Demand (kW), always finite.
    pub load_kw: f64,
}

/// Rows rejected by the validator, per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidRowCounts {
    pub timestamp: usize,
    pub numeric: usize,
}

impl InvalidRowCounts {
    pub fn total(&self) -> usize {
        self.timestamp + self.numeric
    }
}

/// Output of the validator: cleaned readings plus bookkeeping for the report.
#[derive(Debug, Clone)]
pub struct ReadingSet {
    pub schema: InputSchema,
    pub readings: Vec<Reading>,
    /// Data rows read (header excluded).
    pub rows_read: usize,
    pub invalid: InvalidRowCounts,
}

impl ReadingSet {
    /// Earliest and latest timestamp among valid readings.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut iter = self.readings.iter().map(|r| r.timestamp);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }

    /// Sum of every valid reading's load (kW).
    pub fn total_kw(&self) -> f64 {
        self.readings.iter().map(|r| r.load_kw).sum()
    }
}

/// One non-empty time bucket of the load profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub bucket_start: NaiveDateTime,
    /// Sum of every reading that fell into this bucket (kW).
    pub total_kw: f64,
    pub reading_count: usize,
}

/// Missing grid slots between the first and last bucket of a sparse profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GapSummary {
    /// Number of grid slots with no readings.
    pub missing_buckets: usize,
    pub first_missing: Option<NaiveDateTime>,
    pub last_missing: Option<NaiveDateTime>,
}

/// Aggregated load profile over the data span.
///
/// Sparse: only buckets holding at least one reading are present. Bucket
/// starts are strictly increasing and lie on the grid anchored at the
/// earliest valid reading. Immutable once built by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    interval: TimeDelta,
    buckets: Vec<Bucket>,
    data_start: NaiveDateTime,
    data_end: NaiveDateTime,
    gaps: GapSummary,
}

impl LoadProfile {
    pub(crate) fn new(
        interval: TimeDelta,
        buckets: Vec<Bucket>,
        data_start: NaiveDateTime,
        data_end: NaiveDateTime,
        gaps: GapSummary,
    ) -> Self {
        Self {
            interval,
            buckets,
            data_start,
            data_end,
            gaps,
        }
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Bucket width in hours.
    pub fn interval_hours(&self) -> f64 {
        self.interval.num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Earliest valid reading timestamp.
    pub fn data_start(&self) -> NaiveDateTime {
        self.data_start
    }

    /// Latest valid reading timestamp.
    pub fn data_end(&self) -> NaiveDateTime {
        self.data_end
    }

    pub fn gaps(&self) -> GapSummary {
        self.gaps
    }

    /// Hours covered from the first bucket start to the end of the last bucket.
    ///
    /// A single-bucket profile covers exactly one interval width.
    pub fn elapsed_hours(&self) -> f64 {
        match (self.buckets.first(), self.buckets.last()) {
            (Some(first), Some(last)) => {
                let span = last.bucket_start - first.bucket_start;
                span.num_milliseconds() as f64 / 3_600_000.0 + self.interval_hours()
            }
            _ => 0.0,
        }
    }

    /// Sum of every bucket total (kW).
    pub fn total_kw(&self) -> f64 {
        self.buckets.iter().map(|b| b.total_kw).sum()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | total={:>10.3} kW  readings={}",
            self.bucket_start.format("%Y-%m-%d %H:%M:%S"),
            self.total_kw,
            self.reading_count
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 4)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap_or_default()
    }

    fn bucket(h: u32, m: u32, kw: f64) -> Bucket {
        Bucket {
            bucket_start: at(h, m),
            total_kw: kw,
            reading_count: 1,
        }
    }

    #[test]
    fn elapsed_hours_includes_last_interval() {
        let profile = LoadProfile::new(
            TimeDelta::minutes(15),
            vec![bucket(0, 0, 1.0), bucket(0, 15, 2.0), bucket(0, 30, 3.0), bucket(0, 45, 4.0)],
            at(0, 0),
            at(0, 45),
            GapSummary::default(),
        );
        assert!((profile.elapsed_hours() - 1.0).abs() < 1e-12);
        assert_eq!(profile.total_kw(), 10.0);
    }

    #[test]
    fn single_bucket_elapsed_is_interval_width() {
        let profile = LoadProfile::new(
            TimeDelta::minutes(15),
            vec![bucket(3, 0, 5.0)],
            at(3, 0),
            at(3, 0),
            GapSummary::default(),
        );
        assert!((profile.elapsed_hours() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn reading_set_span_and_total() {
        let set = ReadingSet {
            schema: InputSchema::SingleSeries,
            readings: vec![
                Reading {
                    meter_id: None,
                    timestamp: at(1, 0),
                    load_kw: 2.5,
                },
                Reading {
                    meter_id: None,
                    timestamp: at(0, 15),
                    load_kw: 1.5,
                },
            ],
            rows_read: 2,
            invalid: InvalidRowCounts::default(),
        };
        assert_eq!(set.span(), Some((at(0, 15), at(1, 0))));
        assert_eq!(set.total_kw(), 4.0);
    }

    #[test]
    fn schema_columns() {
        assert_eq!(InputSchema::MultiMeter.columns().len(), 4);
        assert_eq!(InputSchema::SingleSeries.columns(), &["date", "time", "kw"]);
    }
}
