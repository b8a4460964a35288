//! Analysis pipeline: runs the stages in order with typed hand-off.

use std::io::Read;

use super::capacity::{self, CapacityReport};
use super::factors::FactorReport;
use super::observer::Observer;
use super::peaks::PeakDetails;
use super::types::{LoadProfile, ReadingSet};
use super::{aggregate, validate};
use crate::config::RunConfig;
use crate::error::AnalysisError;

/// Every stage output of one successful run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub readings: ReadingSet,
    pub profile: LoadProfile,
    pub factors: FactorReport,
    /// `None` when no rated capacity was configured.
    pub capacity: Option<CapacityReport>,
    pub peaks: PeakDetails,
}

/// A configured pipeline.
///
/// Holds no state between runs; concurrent analyses each build their own.
pub struct Pipeline<O: Observer> {
    config: RunConfig,
    observer: O,
}

impl<O: Observer> Pipeline<O> {
    /// Builds a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Config` with the first invalid field.
    pub fn new(config: RunConfig, observer: O) -> Result<Self, AnalysisError> {
        if let Some(first) = config.validate().into_iter().next() {
            return Err(first.into());
        }
        Ok(Self { config, observer })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validates the CSV in `input`, then runs every downstream stage.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages do not run.
    pub fn run<R: Read>(&self, input: R) -> Result<Analysis, AnalysisError> {
        let readings = validate::validate_csv(
            input,
            self.config.analysis.max_invalid_rows,
            &self.observer,
        )?;
        self.run_readings(readings)
    }

    /// Runs aggregation and analysis on already validated readings.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages do not run.
    pub fn run_readings(&self, readings: ReadingSet) -> Result<Analysis, AnalysisError> {
        let a = &self.config.analysis;
        let r = &self.config.report;

        let profile = aggregate::aggregate(&readings, a.interval()?, &self.observer)?;
        let factors = FactorReport::from_profile(&profile, &readings, &self.observer)?;
        let capacity = capacity::classify(&profile, a.rated_capacity()?, &self.observer);
        let peaks = PeakDetails::compute(
            &factors.peak,
            &readings,
            &profile,
            a.target()?,
            &r.voltages,
            r.no_load_threshold_kw,
            &self.observer,
        );

        Ok(Analysis {
            readings,
            profile,
            factors,
            capacity,
            peaks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::observer::testing::RecordingObserver;
    use crate::analysis::observer::{NullObserver, Stage};
    use crate::error::ErrorKind;

    const TWO_METERS: &str = "\
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

    fn config(rated_kva: Option<f64>) -> RunConfig {
        let mut cfg = RunConfig::default();
        cfg.analysis.rated_kva = rated_kva;
        cfg
    }

    #[test]
    fn full_run_produces_every_section() {
        let pipeline = Pipeline::new(config(Some(30.0)), NullObserver);
        let analysis = pipeline.and_then(|p| p.run(TWO_METERS.as_bytes())).ok();
        let a = analysis.as_ref();
        assert_eq!(a.map(|a| a.profile.len()), Some(4));
        assert_eq!(a.map(|a| a.factors.peak.kw), Some(25.0));
        assert!(a.is_some_and(|a| a.capacity.is_some()));
        assert_eq!(a.map(|a| a.peaks.peak_amperage.len()), Some(4));
    }

    #[test]
    fn stages_report_in_order() {
        let obs = RecordingObserver::default();
        let result =
            Pipeline::new(config(Some(30.0)), &obs).and_then(|p| p.run(TWO_METERS.as_bytes()));
        assert!(result.is_ok());
        let stages: Vec<Stage> = obs.completed.borrow().iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Validate,
                Stage::Aggregate,
                Stage::Factors,
                Stage::Capacity,
                Stage::Peaks
            ]
        );
    }

    #[test]
    fn zero_rating_skips_capacity_stage() {
        let obs = RecordingObserver::default();
        let analysis = Pipeline::new(config(Some(0.0)), &obs)
            .and_then(|p| p.run(TWO_METERS.as_bytes()))
            .ok();
        assert!(analysis.is_some_and(|a| a.capacity.is_none()));
        assert_eq!(*obs.skipped.borrow(), vec![Stage::Capacity]);
    }

    #[test]
    fn negative_rating_refuses_to_start() {
        let err = Pipeline::new(config(Some(-75.0)), NullObserver).err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Config));
    }

    #[test]
    fn invalid_config_refuses_to_start() {
        let mut cfg = RunConfig::default();
        cfg.analysis.interval_minutes = 0;
        let err = Pipeline::new(cfg, NullObserver).err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Config));
    }

    #[test]
    fn failure_stops_later_stages() {
        let obs = RecordingObserver::default();
        let input = "date,time,kw\n2024-08-04,00:00:00,5\n2024-08-04,00:15:00,5\n";
        let err = Pipeline::new(config(Some(30.0)), &obs)
            .and_then(|p| p.run(input.as_bytes()))
            .err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::FactorRange));
        let stages: Vec<Stage> = obs.completed.borrow().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![Stage::Validate, Stage::Aggregate]);
    }

    #[test]
    fn rerun_is_identical() {
        let pipeline = Pipeline::new(config(Some(30.0)), NullObserver);
        let first = pipeline.as_ref().ok().and_then(|p| p.run(TWO_METERS.as_bytes()).ok());
        let second = pipeline.as_ref().ok().and_then(|p| p.run(TWO_METERS.as_bytes()).ok());
        assert_eq!(
            first.as_ref().map(|a| a.profile.clone()),
            second.as_ref().map(|a| a.profile.clone())
        );
        assert_eq!(
            first.map(|a| a.factors.factors),
            second.map(|a| a.factors.factors)
        );
    }
}
