// Records produced by a run: emitted sample points and the run metadata

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::AcquisitionError;

/// One acquired value, indices start at 1 and increase by one per sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub index: usize,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(index: usize, value: f64) -> Self {
        Self { index, value }
    }
}

/// Values resolved during `startup`, never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub start_time: SystemTime,
    /// Offset added to every raw sample of the run
    pub bias: f64,
}

impl RunMetadata {
    pub fn new(bias: f64) -> Self {
        Self {
            start_time: SystemTime::now(),
            bias,
        }
    }

    /// Start time as milliseconds since the Unix epoch
    pub fn start_time_ms(&self) -> u64 {
        self.start_time
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn header_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Start Time", self.start_time_ms().to_string()),
            ("Data Bias", format!("{:?}", self.bias)),
        ]
    }
}

/// Destination for emitted points.
///
/// Ownership of each point passes to the sink; the procedure keeps nothing.
pub trait SampleSink {
    fn emit(&mut self, point: SamplePoint) -> Result<(), AcquisitionError>;
}

impl SampleSink for Vec<SamplePoint> {
    fn emit(&mut self, point: SamplePoint) -> Result<(), AcquisitionError> {
        self.push(point);
        Ok(())
    }
}
