// Run events and reports published by the run host

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{AcquisitionError, ErrorCode};
use crate::procedure::SamplePoint;

/// Live event stream of the host; one `Sample` per emitted point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Queued {
        run_id: u64,
    },
    Started {
        run_id: u64,
        metadata: Vec<(String, String)>,
    },
    Sample {
        run_id: u64,
        point: SamplePoint,
    },
    Completed {
        run_id: u64,
        emitted: usize,
    },
    Cancelled {
        run_id: u64,
        emitted: usize,
    },
    Failed {
        run_id: u64,
        emitted: usize,
        code: i32,
        message: String,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> u64 {
        match self {
            RunEvent::Queued { run_id }
            | RunEvent::Started { run_id, .. }
            | RunEvent::Sample { run_id, .. }
            | RunEvent::Completed { run_id, .. }
            | RunEvent::Cancelled { run_id, .. }
            | RunEvent::Failed { run_id, .. } => *run_id,
        }
    }

    /// True for the last event a run publishes
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed { .. } | RunEvent::Cancelled { .. } | RunEvent::Failed { .. }
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Operator abort, partial data retained
    Cancelled,
    Failed { code: i32, message: String },
}

impl RunOutcome {
    pub fn failed(err: &AcquisitionError) -> Self {
        RunOutcome::Failed {
            code: err.code(),
            message: err.message(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

/// Summary handed back for each finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: u64,
    /// Temporary results file; `None` if it could not be created
    pub path: Option<PathBuf>,
    pub outcome: RunOutcome,
    pub emitted: usize,
    pub metadata: Vec<(String, String)>,
}

impl RunReport {
    /// Event matching this report's outcome
    pub fn final_event(&self) -> RunEvent {
        match &self.outcome {
            RunOutcome::Completed => RunEvent::Completed {
                run_id: self.run_id,
                emitted: self.emitted,
            },
            RunOutcome::Cancelled => RunEvent::Cancelled {
                run_id: self.run_id,
                emitted: self.emitted,
            },
            RunOutcome::Failed { code, message } => RunEvent::Failed {
                run_id: self.run_id,
                emitted: self.emitted,
                code: *code,
                message: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = RunEvent::Sample {
            run_id: 2,
            point: SamplePoint::new(1, 0.5),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sample");
        assert_eq!(json["point"]["index"], 1);
        assert_eq!(event.run_id(), 2);
        assert!(!event.is_final());
    }

    #[test]
    fn test_failed_outcome_carries_code() {
        let err = AcquisitionError::HardwareUnavailable {
            details: "gone".to_string(),
        };
        let outcome = RunOutcome::failed(&err);
        assert!(outcome.is_failed());

        let report = RunReport {
            run_id: 1,
            path: None,
            outcome,
            emitted: 3,
            metadata: Vec::new(),
        };
        match report.final_event() {
            RunEvent::Failed { code, emitted, .. } => {
                assert_eq!(code, 1001);
                assert_eq!(emitted, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
