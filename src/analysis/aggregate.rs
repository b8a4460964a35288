//! Temporal aggregator: buckets readings on a fixed grid and sums load.

use std::collections::BTreeMap;

use chrono::TimeDelta;

use super::observer::{Observer, Stage};
use super::types::{Bucket, GapSummary, LoadProfile, ReadingSet};
use crate::config::ConfigError;
use crate::error::AnalysisError;

/// Builds the load profile from validated readings.
///
/// The grid is anchored at the earliest valid reading: each reading falls in
/// bucket `floor((timestamp - origin) / interval)`. Loads of all meters in a
/// bucket are summed. Buckets without readings are not synthesized; they are
/// only counted in the profile's [`GapSummary`].
///
/// # Errors
///
/// * `Config` - `interval` is not positive
/// * `EmptyResult` - there are no valid readings to aggregate
pub fn aggregate(
    set: &ReadingSet,
    interval: TimeDelta,
    observer: &dyn Observer,
) -> Result<LoadProfile, AnalysisError> {
    let width_ms = interval.num_milliseconds();
    if width_ms <= 0 {
        return Err(ConfigError {
            field: "analysis.interval_minutes".into(),
            message: "must be > 0".into(),
        }
        .into());
    }

    let Some((origin, data_end)) = set.span() else {
        return Err(AnalysisError::EmptyResult { valid_readings: 0 });
    };

    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for r in &set.readings {
        let offset_ms = (r.timestamp - origin).num_milliseconds();
        let slot = sums.entry(offset_ms.div_euclid(width_ms)).or_insert((0.0, 0));
        slot.0 += r.load_kw;
        slot.1 += 1;
    }

    let gaps = summarize_gaps(sums.keys().copied(), |idx| {
        origin + TimeDelta::milliseconds(idx * width_ms)
    });

    let buckets: Vec<Bucket> = sums
        .into_iter()
        .map(|(idx, (total_kw, reading_count))| Bucket {
            bucket_start: origin + TimeDelta::milliseconds(idx * width_ms),
            total_kw,
            reading_count,
        })
        .collect();

    observer.stage_completed(Stage::Aggregate, buckets.len());

    Ok(LoadProfile::new(interval, buckets, origin, data_end, gaps))
}

/// Counts grid slots skipped between consecutive occupied indices.
fn summarize_gaps<F>(indices: impl Iterator<Item = i64>, start_of: F) -> GapSummary
where
    F: Fn(i64) -> chrono::NaiveDateTime,
{
    let mut summary = GapSummary::default();
    let mut prev: Option<i64> = None;
    for idx in indices {
        if let Some(p) = prev {
            let missing = idx - p - 1;
            if missing > 0 {
                summary.missing_buckets += missing as usize;
                summary.first_missing.get_or_insert_with(|| start_of(p + 1));
                summary.last_missing = Some(start_of(idx - 1));
            }
        }
        prev = Some(idx);
    }
    summary
}
