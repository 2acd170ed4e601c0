//! Scripted driver that replays fixed readings without live hardware.
//!
//! Every reading handed out comes from one shared script, so a calibration
//! window and the acquisition loop that follows consume consecutive values.
//! Open/read failures can be injected and every open/close is counted, which
//! lets tests assert that channels are released on each exit path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AcquisitionError;
use crate::hardware::{physical_channel, AnalogInput, DaqDriver};

#[derive(Default)]
struct ScriptState {
    readings: Mutex<VecDeque<f64>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
}

/// Driver whose channels return a predetermined sequence of samples.
#[derive(Clone)]
pub struct ScriptedDriver {
    state: Arc<ScriptState>,
    devices: Vec<String>,
    fail_open_after: Option<usize>,
    fail_read_at: Option<usize>,
}

impl ScriptedDriver {
    pub fn new(readings: Vec<f64>) -> Self {
        Self {
            state: Arc::new(ScriptState {
                readings: Mutex::new(readings.into()),
                ..ScriptState::default()
            }),
            devices: vec!["Dev1".to_string()],
            fail_open_after: None,
            fail_read_at: None,
        }
    }

    /// Every open fails.
    pub fn fail_open(self) -> Self {
        self.fail_open_after(0)
    }

    /// The first `successful` opens work, later ones fail.
    pub fn fail_open_after(mut self, successful: usize) -> Self {
        self.fail_open_after = Some(successful);
        self
    }

    /// The `n`-th read across all channels (1-based) fails.
    pub fn fail_read_at(mut self, n: usize) -> Self {
        self.fail_read_at = Some(n);
        self
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    /// Channels opened and not yet closed.
    pub fn open_channels(&self) -> usize {
        self.open_count() - self.close_count()
    }

    pub fn remaining_readings(&self) -> usize {
        self.state
            .readings
            .lock()
            .map(|readings| readings.len())
            .unwrap_or(0)
    }
}

impl DaqDriver for ScriptedDriver {
    fn open_channel(
        &self,
        device: &str,
        port: &str,
    ) -> Result<Box<dyn AnalogInput>, AcquisitionError> {
        if !self.devices.iter().any(|d| d == device) {
            return Err(AcquisitionError::HardwareUnavailable {
                details: format!("device {} not found", device),
            });
        }
        if let Some(limit) = self.fail_open_after {
            if self.open_count() >= limit {
                return Err(AcquisitionError::HardwareUnavailable {
                    details: format!("{} could not be opened", physical_channel(device, port)),
                });
            }
        }

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedChannel {
            name: physical_channel(device, port),
            state: Arc::clone(&self.state),
            fail_read_at: self.fail_read_at,
            closed: false,
        }))
    }

    fn list_devices(&self) -> Result<Vec<String>, AcquisitionError> {
        Ok(self.devices.clone())
    }
}

struct ScriptedChannel {
    name: String,
    state: Arc<ScriptState>,
    fail_read_at: Option<usize>,
    closed: bool,
}

impl AnalogInput for ScriptedChannel {
    fn physical_name(&self) -> &str {
        &self.name
    }

    fn read_one(&mut self) -> Result<f64, AcquisitionError> {
        let n = self.state.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_read_at == Some(n) {
            return Err(AcquisitionError::HardwareUnavailable {
                details: format!("{} disconnected during read {}", self.name, n),
            });
        }

        let mut readings =
            self.state
                .readings
                .lock()
                .map_err(|_| AcquisitionError::HardwareUnavailable {
                    details: "script poisoned".to_string(),
                })?;
        readings
            .pop_front()
            .ok_or_else(|| AcquisitionError::HardwareUnavailable {
                details: format!("{} script exhausted", self.name),
            })
    }

    fn close(&mut self) -> Result<(), AcquisitionError> {
        if !self.closed {
            self.closed = true;
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
