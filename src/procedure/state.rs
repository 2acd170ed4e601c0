// ProcedureState - lifecycle of one procedure instance
//
// Created -> Started -> Executing -> ShutDown, each transition triggered once.
// Failed is terminal and entered from startup or execute on error.

use serde::Serialize;

use crate::error::AcquisitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcedureState {
    Created,
    Started,
    Executing,
    ShutDown,
    Failed,
}

impl ProcedureState {
    pub fn name(&self) -> &'static str {
        match self {
            ProcedureState::Created => "Created",
            ProcedureState::Started => "Started",
            ProcedureState::Executing => "Executing",
            ProcedureState::ShutDown => "ShutDown",
            ProcedureState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcedureState::ShutDown | ProcedureState::Failed)
    }

    /// Fail with `InvalidState` unless in `expected`.
    pub fn require(&self, expected: ProcedureState) -> Result<(), AcquisitionError> {
        if *self == expected {
            Ok(())
        } else {
            Err(AcquisitionError::InvalidState {
                expected: expected.name(),
                actual: self.name(),
            })
        }
    }

    /// `shutdown` is accepted from any state after `startup` was attempted.
    pub fn can_shut_down(&self) -> bool {
        matches!(
            self,
            ProcedureState::Started | ProcedureState::Executing | ProcedureState::Failed
        )
    }
}
