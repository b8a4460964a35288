//! Observability collaborator injected into every pipeline stage.

use std::fmt;

use crate::error::InvalidKind;

/// Pipeline stage identifier used in observer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Aggregate,
    Factors,
    Capacity,
    Peaks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::Aggregate => "aggregate",
            Self::Factors => "factors",
            Self::Capacity => "capacity",
            Self::Peaks => "peaks",
        };
        f.write_str(name)
    }
}

/// Receives progress and diagnostics from the stages.
///
/// All methods default to no-ops so implementors pick what they need.
/// Stages hold only a shared reference; nothing here affects results.
pub trait Observer {
    /// A data row was dropped. `line` is the 1-based line in the input.
    fn row_rejected(&self, _line: u64, _kind: InvalidKind, _raw: &str) {}

    /// A stage finished and produced `items` outputs.
    fn stage_completed(&self, _stage: Stage, _items: usize) {}

    /// A domain sanity check passed.
    fn check_passed(&self, _check: &'static str, _value: f64) {}

    /// An optional stage did not run.
    fn stage_skipped(&self, _stage: Stage, _reason: &str) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn row_rejected(&self, line: u64, kind: InvalidKind, raw: &str) {
        tracing::debug!(line, %kind, raw, "row rejected");
    }

    fn stage_completed(&self, stage: Stage, items: usize) {
        tracing::info!(%stage, items, "stage completed");
    }

    fn check_passed(&self, check: &'static str, value: f64) {
        tracing::debug!(check, value, "check passed");
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        tracing::info!(%stage, reason, "stage skipped");
    }
}

impl<O: Observer + ?Sized> Observer for &O {
    fn row_rejected(&self, line: u64, kind: InvalidKind, raw: &str) {
        (**self).row_rejected(line, kind, raw);
    }

    fn stage_completed(&self, stage: Stage, items: usize) {
        (**self).stage_completed(stage, items);
    }

    fn check_passed(&self, check: &'static str, value: f64) {
        (**self).check_passed(check, value);
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        (**self).stage_skipped(stage, reason);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Records every callback for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub rejected: RefCell<Vec<(u64, InvalidKind)>>,
        pub completed: RefCell<Vec<(Stage, usize)>>,
        pub checks: RefCell<Vec<&'static str>>,
        pub skipped: RefCell<Vec<Stage>>,
    }

    impl Observer for RecordingObserver {
        fn row_rejected(&self, line: u64, kind: InvalidKind, _raw: &str) {
            self.rejected.borrow_mut().push((line, kind));
        }

        fn stage_completed(&self, stage: Stage, items: usize) {
            self.completed.borrow_mut().push((stage, items));
        }

        fn check_passed(&self, check: &'static str, _value: f64) {
            self.checks.borrow_mut().push(check);
        }

        fn stage_skipped(&self, stage: Stage, _reason: &str) {
            self.skipped.borrow_mut().push(stage);
        }
    }
}
