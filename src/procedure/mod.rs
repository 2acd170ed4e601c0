// Procedure module - the acquisition lifecycle driven by a run host
//
// A procedure exposes three hooks the host calls in fixed order:
// 1. startup: resolve the run's bias (optionally from a background window)
// 2. execute: acquire samples and hand each one to the sink
// 3. shutdown: finish without touching hardware

pub mod acquisition;
pub mod bias;
pub mod cancel;
pub mod params;
pub mod sample;
pub mod state;

pub use acquisition::{AcquisitionProcedure, DATA_COLUMNS};
pub use bias::{bias_from_background, CALIBRATION_WINDOW};
pub use cancel::CancelToken;
pub use params::{BiasMode, RunParameters};
pub use sample::{RunMetadata, SamplePoint, SampleSink};
pub use state::ProcedureState;

use serde::Serialize;

use crate::error::AcquisitionError;

/// Result of a lifecycle step that completed without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepOutcome {
    Completed { emitted: usize },
    /// Operator abort; emitted points stay valid
    Cancelled { emitted: usize },
}

/// Lifecycle contract between a run host and an experiment.
///
/// The host is agnostic of what the procedure measures; it only relies on the
/// hook order and on the header entries for persistence.
pub trait Procedure: Send {
    /// Identifier written into results headers
    fn name(&self) -> &'static str;

    /// Column names of emitted records
    fn columns(&self) -> &'static [&'static str];

    fn state(&self) -> ProcedureState;

    fn parameter_entries(&self) -> Vec<(&'static str, String)>;

    /// Empty until `startup` has completed
    fn metadata_entries(&self) -> Vec<(&'static str, String)>;

    fn startup(&mut self, cancel: &CancelToken) -> Result<StepOutcome, AcquisitionError>;

    fn execute(
        &mut self,
        cancel: &CancelToken,
        sink: &mut dyn SampleSink,
    ) -> Result<StepOutcome, AcquisitionError>;

    fn shutdown(&mut self) -> Result<(), AcquisitionError>;
}
