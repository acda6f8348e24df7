//! Progress and diagnostics seam.
//!
//! Observers are purely observational: nothing reported here feeds back into
//! the algorithms. Progress display, failure dashboards, and elbow-curve
//! plotting all live behind this trait, outside the crate.

use crate::cluster::ElbowReport;
use crate::schedule::Window;
use crate::validate::ValidationFailure;

/// External sink for progress counters and retry diagnostics.
#[allow(unused_variables)]
pub trait Observer {
    /// Cumulative completion counter: `completed` of `total` pending units.
    fn progress(&mut self, completed: usize, total: usize) {}

    /// A window's response failed validation and will be retried.
    ///
    /// Carries the full offending response so an operator can diagnose a
    /// pathological prompt/oracle interaction.
    fn validation_failed(&mut self, window: Window, failure: &ValidationFailure, response: &str) {}

    /// The pre-classifier selected an elbow point.
    fn elbow_selected(&mut self, report: &ElbowReport) {}
}

/// Observer that ignores every event.
pub struct NullObserver;

impl Observer for NullObserver {}
