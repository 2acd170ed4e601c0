// AcquisitionProcedure - bias calibration followed by a software-timed
// sampling loop on one analog input.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{log_acquisition_error, AcquisitionError};
use crate::hardware::{ChannelGuard, DaqDriver};

use super::bias::resolve_bias;
use super::cancel::CancelToken;
use super::params::RunParameters;
use super::sample::{RunMetadata, SamplePoint, SampleSink};
use super::state::ProcedureState;
use super::{Procedure, StepOutcome};

/// Columns emitted per sample
pub const DATA_COLUMNS: [&str; 2] = ["Sample", "Y"];

pub struct AcquisitionProcedure {
    params: RunParameters,
    driver: Arc<dyn DaqDriver>,
    state: ProcedureState,
    metadata: Option<RunMetadata>,
}

impl AcquisitionProcedure {
    pub fn new(params: RunParameters, driver: Arc<dyn DaqDriver>) -> Self {
        Self {
            params,
            driver,
            state: ProcedureState::Created,
            metadata: None,
        }
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    /// Resolved during `startup`; `None` before it or after a cancelled startup
    pub fn metadata(&self) -> Option<&RunMetadata> {
        self.metadata.as_ref()
    }

    fn acquire(
        &self,
        bias: f64,
        cancel: &CancelToken,
        sink: &mut dyn SampleSink,
    ) -> Result<StepOutcome, AcquisitionError> {
        let wait = self.params.wait_duration()?;
        let mut channel =
            ChannelGuard::open(self.driver.as_ref(), &self.params.device, &self.params.input_port)?;
        let total = self.params.data_points;

        for index in 1..=total {
            if cancel.is_cancelled() {
                return Ok(StepOutcome::Cancelled { emitted: index - 1 });
            }

            let raw = channel.read_one()?;
            let point = SamplePoint::new(index, raw + bias);
            sink.emit(point)?;
            debug!("Sample {}/{}: raw={} value={}", index, total, raw, point.value);

            // No wait after the final sample
            if index < total && cancel.wait_timeout(wait) {
                return Ok(StepOutcome::Cancelled { emitted: index });
            }
        }

        channel.close()?;
        Ok(StepOutcome::Completed { emitted: total })
    }

    fn fail(&mut self, err: &AcquisitionError, context: &str) {
        self.state = ProcedureState::Failed;
        log_acquisition_error(err, context);
    }
}

impl Procedure for AcquisitionProcedure {
    fn name(&self) -> &'static str {
        "daq_recorder.AcquisitionProcedure"
    }

    fn columns(&self) -> &'static [&'static str] {
        &DATA_COLUMNS
    }

    fn state(&self) -> ProcedureState {
        self.state
    }

    fn parameter_entries(&self) -> Vec<(&'static str, String)> {
        self.params.header_entries()
    }

    fn metadata_entries(&self) -> Vec<(&'static str, String)> {
        self.metadata
            .map(|metadata| metadata.header_entries())
            .unwrap_or_default()
    }

    fn startup(&mut self, cancel: &CancelToken) -> Result<StepOutcome, AcquisitionError> {
        self.state.require(ProcedureState::Created)?;
        info!("Startup");

        match resolve_bias(&self.params, self.driver.as_ref(), cancel) {
            Ok(Some(bias)) => {
                let metadata = RunMetadata::new(bias);
                info!("Data bias resolved to {}", metadata.bias);
                self.metadata = Some(metadata);
                self.state = ProcedureState::Started;
                Ok(StepOutcome::Completed { emitted: 0 })
            }
            Ok(None) => {
                warn!("Run cancelled during bias calibration");
                self.state = ProcedureState::Started;
                Ok(StepOutcome::Cancelled { emitted: 0 })
            }
            Err(err) => {
                self.fail(&err, "startup");
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        cancel: &CancelToken,
        sink: &mut dyn SampleSink,
    ) -> Result<StepOutcome, AcquisitionError> {
        self.state.require(ProcedureState::Started)?;
        let bias = match self.metadata {
            Some(metadata) => metadata.bias,
            None => {
                // Startup was cancelled; nothing to acquire
                return Err(AcquisitionError::InvalidState {
                    expected: "Started with resolved bias",
                    actual: self.state.name(),
                });
            }
        };

        info!("Reading Input");
        self.state = ProcedureState::Executing;
        match self.acquire(bias, cancel, sink) {
            Ok(outcome) => {
                if let StepOutcome::Cancelled { emitted } = outcome {
                    warn!("Run cancelled after {} samples", emitted);
                }
                Ok(outcome)
            }
            Err(err) => {
                self.fail(&err, "execute");
                Err(err)
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), AcquisitionError> {
        if !self.state.can_shut_down() {
            return Err(AcquisitionError::InvalidState {
                expected: "Started, Executing or Failed",
                actual: self.state.name(),
            });
        }
        if self.state != ProcedureState::Failed {
            self.state = ProcedureState::ShutDown;
        }
        info!("Ending Procedure");
        Ok(())
    }
}
