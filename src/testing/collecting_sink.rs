//! In-memory sink that can play an impatient or disappearing consumer.

use crate::error::AcquisitionError;
use crate::procedure::{CancelToken, SamplePoint, SampleSink};

#[derive(Default)]
pub struct CollectingSink {
    points: Vec<SamplePoint>,
    cancel_after: Option<(usize, CancelToken)>,
    fail_after: Option<usize>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation once `count` points have been collected.
    pub fn cancel_after(mut self, count: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    /// Refuse every point after the first `count`.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }
}

impl SampleSink for CollectingSink {
    fn emit(&mut self, point: SamplePoint) -> Result<(), AcquisitionError> {
        if self.fail_after == Some(self.points.len()) {
            return Err(AcquisitionError::SinkClosed);
        }
        self.points.push(point);

        if let Some((count, token)) = &self.cancel_after {
            if self.points.len() >= *count {
                token.cancel();
            }
        }
        Ok(())
    }
}
