//! Reading validator: schema detection, timestamp/kW coercion, row tolerance.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;

use super::observer::{Observer, Stage};
use super::types::{InputSchema, InvalidRowCounts, Reading, ReadingSet};
use crate::error::{AnalysisError, InvalidKind};

const DATE_FORMAT: &str = "%Y-%m-%d";
/// `%.f` accepts both `HH:MM:SS` and `HH:MM:SS.mmm`.
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Matches the header against the supported column sets.
///
/// # Errors
///
/// Returns `AnalysisError::Schema` unless the header is exactly
/// `meter,date,time,kw` or `date,time,kw`.
pub fn detect_schema(headers: &StringRecord) -> Result<InputSchema, AnalysisError> {
    let names: Vec<&str> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
        .map(str::trim)
        .collect();

    [InputSchema::MultiMeter, InputSchema::SingleSeries]
        .into_iter()
        .find(|schema| schema.columns() == names.as_slice())
        .ok_or_else(|| AnalysisError::Schema {
            found: names.join(","),
        })
}

/// Combines a `YYYY-MM-DD` date and `HH:MM:SS[.mmm]` time.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let d = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    let t = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT).ok()?;
    Some(d.and_time(t))
}

/// Coerces a kW field; empty, non-numeric and non-finite values are rejected.
pub fn parse_kw(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Tracks rejected rows of one category.
#[derive(Default)]
struct Rejections {
    count: usize,
    first_line: Option<u64>,
}

impl Rejections {
    fn record(&mut self, line: u64) {
        self.count += 1;
        self.first_line.get_or_insert(line);
    }

    fn check(&self, kind: InvalidKind, threshold: usize) -> Result<(), AnalysisError> {
        if self.count > threshold {
            return Err(AnalysisError::DataQuality {
                kind,
                count: self.count,
                threshold,
                first_line: self.first_line.unwrap_or(0),
            });
        }
        Ok(())
    }
}

/// Column positions of the fields for a schema.
struct Columns {
    meter: Option<usize>,
    date: usize,
    time: usize,
    kw: usize,
}

impl Columns {
    fn for_schema(schema: InputSchema) -> Self {
        match schema {
            InputSchema::MultiMeter => Self {
                meter: Some(0),
                date: 1,
                time: 2,
                kw: 3,
            },
            InputSchema::SingleSeries => Self {
                meter: None,
                date: 0,
                time: 1,
                kw: 2,
            },
        }
    }
}

/// Reads and validates a CSV dataset.
///
/// Rows whose timestamp does not parse are dropped first; of the remaining
/// rows, those whose `kw` is not a finite number are dropped. A field that is
/// not valid UTF-8 fails the parse of its category. Each category is counted
/// separately and may hold at most `max_invalid_rows` rows.
///
/// # Errors
///
/// * `Schema` - unsupported header
/// * `DataQuality` - a rejection category exceeds `max_invalid_rows`
/// * `Csv` - the input is not readable as CSV
pub fn validate_csv<R: Read>(
    input: R,
    max_invalid_rows: usize,
    observer: &dyn Observer,
) -> Result<ReadingSet, AnalysisError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let schema = detect_schema(rdr.headers()?)?;
    let cols = Columns::for_schema(schema);

    let mut meters: HashSet<Arc<str>> = HashSet::new();
    let mut readings = Vec::new();
    let mut rows_read = 0usize;
    let mut bad_ts = Rejections::default();
    let mut bad_kw = Rejections::default();

    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result?;
        rows_read += 1;
        let line = record
            .position()
            .map_or(idx as u64 + 2, csv::Position::line);
        let field = |i: usize| std::str::from_utf8(record.get(i).unwrap_or_default()).ok();
        let raw = || String::from_utf8_lossy(record.as_slice());

        let timestamp = match (field(cols.date), field(cols.time)) {
            (Some(date), Some(time)) => parse_timestamp(date, time),
            _ => None,
        };
        let Some(timestamp) = timestamp else {
            bad_ts.record(line);
            observer.row_rejected(line, InvalidKind::Timestamp, &raw());
            continue;
        };

        let Some(load_kw) = field(cols.kw).and_then(parse_kw) else {
            bad_kw.record(line);
            observer.row_rejected(line, InvalidKind::Numeric, &raw());
            continue;
        };

        let meter_id = cols.meter.map(|i| {
            let id = String::from_utf8_lossy(record.get(i).unwrap_or_default());
            let id = id.trim();
            match meters.get(id) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let interned: Arc<str> = Arc::from(id);
                    meters.insert(Arc::clone(&interned));
                    interned
                }
            }
        });

        readings.push(Reading {
            meter_id,
            timestamp,
            load_kw,
        });
    }

    bad_ts.check(InvalidKind::Timestamp, max_invalid_rows)?;
    bad_kw.check(InvalidKind::Numeric, max_invalid_rows)?;

    observer.stage_completed(Stage::Validate, readings.len());

    Ok(ReadingSet {
        schema,
        readings,
        rows_read,
        invalid: InvalidRowCounts {
            timestamp: bad_ts.count,
            numeric: bad_kw.count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::observer::NullObserver;
    use crate::analysis::observer::testing::RecordingObserver;
    use crate::error::ErrorKind;

    fn run(csv: &str) -> Result<ReadingSet, AnalysisError> {
        validate_csv(csv.as_bytes(), 3, &NullObserver)
    }

    fn with_bad_rows(n: usize, bad: &str) -> String {
        let mut s = String::from("meter,date,time,kw\n");
        for i in 0..8 {
            s.push_str(&format!("m1,2024-08-04,00:{:02}:00.000,1.5\n", i * 5));
        }
        for _ in 0..n {
            s.push_str(bad);
        }
        s
    }

    #[test]
    fn multi_meter_header_accepted() {
        let set = run("meter,date,time,kw\n74592856,2024-08-04,00:15:00.000,3.296\n").ok();
        assert_eq!(set.as_ref().map(|s| s.schema), Some(InputSchema::MultiMeter));
        let r = set.as_ref().and_then(|s| s.readings.first());
        assert_eq!(r.and_then(|r| r.meter_id.as_deref()), Some("74592856"));
        assert_eq!(r.map(|r| r.load_kw), Some(3.296));
    }

    #[test]
    fn single_series_header_accepted() {
        let set = run("date,time,kw\n2024-08-04,00:15:00,2.0\n").ok();
        assert_eq!(set.as_ref().map(|s| s.schema), Some(InputSchema::SingleSeries));
        assert!(
            set.as_ref()
                .and_then(|s| s.readings.first())
                .is_some_and(|r| r.meter_id.is_none())
        );
    }

    #[test]
    fn unsupported_header_is_schema_error() {
        for header in ["ts,meter_id,kwh", "meter,date,time", "date,time,kw,extra", ""] {
            let err = run(&format!("{header}\n1,2,3\n")).err();
            assert_eq!(
                err.as_ref().map(AnalysisError::kind),
                Some(ErrorKind::Schema),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn time_with_and_without_millis() {
        assert!(parse_timestamp("2024-08-04", "00:15:00").is_some());
        assert!(parse_timestamp("2024-08-04", "00:15:00.250").is_some());
        assert!(parse_timestamp("08/04/2024", "00:15:00").is_none());
        assert!(parse_timestamp("2024-08-04", "25:00:00").is_none());
    }

    #[test]
    fn kw_coercion_rejects_non_numeric_and_non_finite() {
        assert_eq!(parse_kw(" 4.424 "), Some(4.424));
        assert_eq!(parse_kw("-1.5"), Some(-1.5));
        assert_eq!(parse_kw(""), None);
        assert_eq!(parse_kw("12.3.4"), None);
        assert_eq!(parse_kw("NaN"), None);
        assert_eq!(parse_kw("inf"), None);
    }

    #[test]
    fn three_bad_timestamps_tolerated() {
        let set = run(&with_bad_rows(3, "m1,not-a-date,00:00:00,1.0\n")).ok();
        assert_eq!(set.as_ref().map(|s| s.invalid.timestamp), Some(3));
        assert_eq!(set.as_ref().map(|s| s.readings.len()), Some(8));
        assert_eq!(set.as_ref().map(|s| s.rows_read), Some(11));
    }

    #[test]
    fn four_bad_timestamps_rejected() {
        let err = run(&with_bad_rows(4, "m1,not-a-date,00:00:00,1.0\n")).err();
        assert!(matches!(
            err,
            Some(AnalysisError::DataQuality {
                kind: InvalidKind::Timestamp,
                count: 4,
                threshold: 3,
                first_line: 10,
            })
        ));
    }

    #[test]
    fn four_bad_kw_rejected_three_tolerated() {
        assert!(run(&with_bad_rows(3, "m1,2024-08-04,01:00:00,abc\n")).is_ok());
        let err = run(&with_bad_rows(4, "m1,2024-08-04,01:00:00,abc\n")).err();
        assert!(matches!(
            err,
            Some(AnalysisError::DataQuality {
                kind: InvalidKind::Numeric,
                count: 4,
                ..
            })
        ));
    }

    #[test]
    fn categories_are_counted_separately() {
        let mut csv = with_bad_rows(3, "m1,bad,00:00:00,1.0\n");
        for _ in 0..3 {
            csv.push_str("m1,2024-08-04,02:00:00,\n");
        }
        let set = run(&csv).ok();
        assert_eq!(
            set.map(|s| s.invalid),
            Some(InvalidRowCounts {
                timestamp: 3,
                numeric: 3,
            })
        );
    }

    #[test]
    fn row_failing_both_counts_as_timestamp() {
        let set = run(&with_bad_rows(1, "m1,bad,bad,bad\n")).ok();
        assert_eq!(
            set.map(|s| s.invalid),
            Some(InvalidRowCounts {
                timestamp: 1,
                numeric: 0,
            })
        );
    }

    #[test]
    fn short_rows_are_invalid_not_fatal() {
        let set = run(&with_bad_rows(1, "m1,2024-08-04\n")).ok();
        assert_eq!(set.map(|s| s.invalid.timestamp), Some(1));
    }

    #[test]
    fn non_utf8_kw_counts_as_numeric_failure() {
        let csv: &[u8] = b"date,time,kw\n\
2024-08-04,00:00:00,1\n\
2024-08-04,00:15:00,2\n\
2024-08-04,00:30:00,3\n\
2024-08-04,00:45:00,\xff\xfe\n";
        let obs = RecordingObserver::default();
        let set = validate_csv(csv, 3, &obs).ok();
        assert_eq!(set.as_ref().map(|s| s.invalid.numeric), Some(1));
        assert_eq!(set.as_ref().map(|s| s.readings.len()), Some(3));
        assert_eq!(*obs.rejected.borrow(), vec![(5, InvalidKind::Numeric)]);
    }

    #[test]
    fn non_utf8_time_counts_as_timestamp_failure() {
        let csv: &[u8] = b"meter,date,time,kw\n\
m\xff,2024-08-04,00:00:00,1\n\
m1,2024-08-04,\xc3,2\n";
        let set = validate_csv(csv, 3, &NullObserver).ok();
        assert_eq!(
            set.as_ref().map(|s| s.invalid),
            Some(InvalidRowCounts {
                timestamp: 1,
                numeric: 0,
            })
        );
        let id = set
            .as_ref()
            .and_then(|s| s.readings.first())
            .and_then(|r| r.meter_id.as_deref().map(str::to_string));
        assert_eq!(id.as_deref(), Some("m\u{fffd}"));
    }

    #[test]
    fn threshold_is_configurable() {
        let csv = with_bad_rows(10, "m1,bad,00:00:00,1.0\n");
        assert!(validate_csv(csv.as_bytes(), 10, &NullObserver).is_ok());
        assert!(validate_csv(csv.as_bytes(), 9, &NullObserver).is_err());
    }

    #[test]
    fn observer_sees_each_rejection_with_line() {
        let obs = RecordingObserver::default();
        let csv = "date,time,kw\n2024-08-04,00:00:00,1\nbad,00:15:00,1\n2024-08-04,00:30:00,x\n";
        let set = validate_csv(csv.as_bytes(), 3, &obs);
        assert!(set.is_ok());
        assert_eq!(
            *obs.rejected.borrow(),
            vec![(3, InvalidKind::Timestamp), (4, InvalidKind::Numeric)]
        );
        assert_eq!(*obs.completed.borrow(), vec![(Stage::Validate, 1)]);
    }

    #[test]
    fn meter_ids_are_shared() {
        let csv = "meter,date,time,kw\nA,2024-08-04,00:00:00,1\nA,2024-08-04,00:15:00,2\n";
        let set = run(csv).ok();
        let ids: Vec<Arc<str>> = set
            .map(|s| s.readings.into_iter().filter_map(|r| r.meter_id).collect())
            .unwrap_or_default();
        assert_eq!(ids.len(), 2);
        assert!(Arc::ptr_eq(&ids[0], &ids[1]));
    }
}
