use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AcquisitionError;

use super::{physical_channel, AnalogInput, DaqDriver};

/// Settings for the simulated driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedDriverConfig {
    /// Device names reported by `list_devices`
    pub devices: Vec<String>,
    /// Devices that are listed but refuse every open, as if held elsewhere
    pub busy: Vec<String>,
    /// Constant offset present on every input (V)
    pub dc_offset: f64,
    /// Peak amplitude of the uniform noise added to each read (V)
    pub noise_amplitude: f64,
    /// RNG seed; each opened channel restarts from it
    pub seed: u64,
}

impl Default for SimulatedDriverConfig {
    fn default() -> Self {
        Self {
            devices: vec!["Dev1".to_string()],
            busy: Vec::new(),
            dc_offset: 0.25,
            noise_amplitude: 0.01,
            seed: 7,
        }
    }
}

/// Deterministic desktop driver used by the CLI and for dry runs.
///
/// Channels are exclusive: opening a `<device>/<port>` that is already held
/// fails the same way a reserved hardware line does.
pub struct SimulatedDriver {
    config: SimulatedDriverConfig,
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl SimulatedDriver {
    pub fn new(config: SimulatedDriverConfig) -> Self {
        Self {
            config,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(SimulatedDriverConfig::default())
    }
}

impl DaqDriver for SimulatedDriver {
    fn open_channel(
        &self,
        device: &str,
        port: &str,
    ) -> Result<Box<dyn AnalogInput>, AcquisitionError> {
        if !self.config.devices.iter().any(|d| d == device) {
            return Err(AcquisitionError::HardwareUnavailable {
                details: format!("device {} not found", device),
            });
        }

        if self.config.busy.iter().any(|d| d == device) {
            return Err(AcquisitionError::HardwareUnavailable {
                details: format!("device {} is in use by another application", device),
            });
        }

        let name = physical_channel(device, port);
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| AcquisitionError::HardwareUnavailable {
                details: "simulated driver state poisoned".to_string(),
            })?;
        if !claimed.insert(name.clone()) {
            return Err(AcquisitionError::HardwareUnavailable {
                details: format!("{} is already reserved", name),
            });
        }

        info!("[Simulated] Opened {}", name);
        Ok(Box::new(SimulatedChannel {
            name,
            dc_offset: self.config.dc_offset,
            noise_amplitude: self.config.noise_amplitude,
            rng: StdRng::seed_from_u64(self.config.seed),
            claimed: Arc::clone(&self.claimed),
        }))
    }

    fn list_devices(&self) -> Result<Vec<String>, AcquisitionError> {
        Ok(self.config.devices.clone())
    }
}

struct SimulatedChannel {
    name: String,
    dc_offset: f64,
    noise_amplitude: f64,
    rng: StdRng,
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl AnalogInput for SimulatedChannel {
    fn physical_name(&self) -> &str {
        &self.name
    }

    fn read_one(&mut self) -> Result<f64, AcquisitionError> {
        let noise = if self.noise_amplitude > 0.0 {
            self.rng
                .gen_range(-self.noise_amplitude..=self.noise_amplitude)
        } else {
            0.0
        };
        Ok(self.dc_offset + noise)
    }

    fn close(&mut self) -> Result<(), AcquisitionError> {
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| AcquisitionError::HardwareUnavailable {
                details: "simulated driver state poisoned".to_string(),
            })?;
        claimed.remove(&self.name);
        Ok(())
    }
}
