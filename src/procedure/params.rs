// RunParameters - immutable configuration for one acquisition run

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AcquisitionError;

/// How the run's bias is obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiasMode {
    /// No offset, bias is exactly 0
    Off,
    /// Operator-supplied offset applied verbatim
    Manual(f64),
    /// Offset measured from a background window during startup
    Auto,
}

/// Parameters for a single run, fixed before `startup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParameters {
    /// Operator name, recorded in the results header only
    pub user: String,
    /// Sample label chosen from the configured sample list
    pub sample: Option<String>,
    /// Device identifier, e.g. `Dev1`
    pub device: String,
    /// Analog input port, e.g. `ai0`
    pub input_port: String,
    /// Analog output port; persisted, never driven
    pub output_port: String,
    /// Number of samples to acquire
    pub data_points: usize,
    /// Delay between samples in seconds
    pub wait_time: f64,
    pub data_bias_toggle: bool,
    /// Only consulted when `data_bias_toggle` is set
    pub auto_bias_toggle: bool,
    pub manual_data_bias: f64,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            user: String::new(),
            sample: None,
            device: "Dev1".to_string(),
            input_port: "ai0".to_string(),
            output_port: "ao0".to_string(),
            data_points: 10,
            wait_time: 0.1,
            data_bias_toggle: false,
            auto_bias_toggle: false,
            manual_data_bias: 0.0,
        }
    }
}

impl RunParameters {
    pub fn bias_mode(&self) -> BiasMode {
        match (self.data_bias_toggle, self.auto_bias_toggle) {
            (false, _) => BiasMode::Off,
            (true, false) => BiasMode::Manual(self.manual_data_bias),
            (true, true) => BiasMode::Auto,
        }
    }

    /// Inter-sample delay.
    ///
    /// # Errors
    /// `AcquisitionError::InvalidParameters` if `wait_time` is negative, not
    /// finite or too large to represent as a `Duration`
    pub fn wait_duration(&self) -> Result<Duration, AcquisitionError> {
        Duration::try_from_secs_f64(self.wait_time).map_err(|_| AcquisitionError::InvalidParameters {
            reason: format!(
                "wait time must be a non-negative number of seconds (got {})",
                self.wait_time
            ),
        })
    }

    /// Check the parameters before a run is queued.
    ///
    /// # Arguments
    /// * `known_samples` - Configured sample list; an empty list disables the
    ///   sample check
    ///
    /// # Errors
    /// `AcquisitionError::InvalidParameters` describing the first problem found
    pub fn validate(&self, known_samples: &[String]) -> Result<(), AcquisitionError> {
        for (label, value) in self.text_fields() {
            if value.contains(['\n', '\r']) {
                return Err(AcquisitionError::InvalidParameters {
                    reason: format!("{} must be a single line", label),
                });
            }
        }
        if self.device.trim().is_empty() {
            return Err(invalid("device must not be empty"));
        }
        if self.input_port.trim().is_empty() {
            return Err(invalid("input port must not be empty"));
        }
        if self.data_points == 0 {
            return Err(invalid("data points must be greater than 0"));
        }
        self.wait_duration()?;
        if !self.manual_data_bias.is_finite() {
            return Err(invalid("manual data bias must be finite"));
        }
        if let Some(sample) = &self.sample {
            if !known_samples.is_empty() && !known_samples.iter().any(|s| s == sample) {
                return Err(AcquisitionError::InvalidParameters {
                    reason: format!("unknown sample '{}'", sample),
                });
            }
        }
        Ok(())
    }

    // Written verbatim into one header line each
    fn text_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("user", self.user.as_str()),
            ("sample", self.sample.as_deref().unwrap_or_default()),
            ("device", self.device.as_str()),
            ("input port", self.input_port.as_str()),
            ("output port", self.output_port.as_str()),
        ]
    }

    /// Labelled values written into the results header.
    pub fn header_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("User", self.user.clone()),
            ("Sample", self.sample.clone().unwrap_or_default()),
            ("DAQ Name", self.device.clone()),
            ("Input Port", self.input_port.clone()),
            ("Output Port", self.output_port.clone()),
            ("Data Points to Acquire", self.data_points.to_string()),
            ("Sample Wait Time", format!("{} s", self.wait_time)),
            ("Data Bias Toggle", title_case_bool(self.data_bias_toggle)),
            ("Auto-Bias Data", title_case_bool(self.auto_bias_toggle)),
            ("Manual Data Bias", format!("{:?}", self.manual_data_bias)),
        ]
    }
}

fn invalid(reason: &str) -> AcquisitionError {
    AcquisitionError::InvalidParameters {
        reason: reason.to_string(),
    }
}

// Downstream readers of the results format expect True/False.
fn title_case_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}
