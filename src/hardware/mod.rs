//! Hardware abstractions for analog input acquisition.
//!
//! Drivers hand out exclusively-owned input channels. Callers never hold a
//! raw channel; they go through [`ChannelGuard`], which closes the channel on
//! every exit path.

use tracing::{debug, warn};

use crate::error::AcquisitionError;

mod simulated;
pub use simulated::{SimulatedDriver, SimulatedDriverConfig};

/// Physical channel name in the `<device>/<port>` form drivers expect.
pub fn physical_channel(device: &str, port: &str) -> String {
    format!("{}/{}", device, port)
}

/// One open analog input line.
pub trait AnalogInput: Send {
    /// `<device>/<port>` this channel is bound to.
    fn physical_name(&self) -> &str;

    /// Read a single software-timed sample.
    fn read_one(&mut self) -> Result<f64, AcquisitionError>;

    /// Release the line. Called at most once by [`ChannelGuard`].
    fn close(&mut self) -> Result<(), AcquisitionError>;
}

/// Trait implemented by data-acquisition drivers.
pub trait DaqDriver: Send + Sync {
    /// Open an input channel on `device`/`port`.
    ///
    /// Fails with [`AcquisitionError::HardwareUnavailable`] when the device is
    /// missing, the port is already claimed, or access is denied.
    fn open_channel(&self, device: &str, port: &str)
        -> Result<Box<dyn AnalogInput>, AcquisitionError>;

    /// Names of the devices currently visible to the driver.
    fn list_devices(&self) -> Result<Vec<String>, AcquisitionError>;
}

/// Scoped ownership of an open channel.
pub struct ChannelGuard {
    channel: Option<Box<dyn AnalogInput>>,
}

impl ChannelGuard {
    pub fn open(driver: &dyn DaqDriver, device: &str, port: &str) -> Result<Self, AcquisitionError> {
        let channel = driver.open_channel(device, port)?;
        debug!("Opened channel {}", channel.physical_name());
        Ok(Self {
            channel: Some(channel),
        })
    }

    pub fn physical_name(&self) -> &str {
        self.channel
            .as_ref()
            .map(|channel| channel.physical_name())
            .unwrap_or("<closed>")
    }

    pub fn read_one(&mut self) -> Result<f64, AcquisitionError> {
        match self.channel.as_mut() {
            Some(channel) => channel.read_one(),
            None => Err(AcquisitionError::HardwareUnavailable {
                details: "channel already closed".to_string(),
            }),
        }
    }

    /// Close explicitly, surfacing any driver error.
    pub fn close(mut self) -> Result<(), AcquisitionError> {
        match self.channel.take() {
            Some(mut channel) => {
                debug!("Closing channel {}", channel.physical_name());
                channel.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            debug!("Releasing channel {}", channel.physical_name());
            if let Err(err) = channel.close() {
                warn!("Failed to close channel {}: {}", channel.physical_name(), err);
            }
        }
    }
}
