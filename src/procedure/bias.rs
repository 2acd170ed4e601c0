// Background calibration - estimates the DC offset to cancel from every sample

use std::time::Duration;

use tracing::{debug, info};

use crate::error::AcquisitionError;
use crate::hardware::{ChannelGuard, DaqDriver};

use super::cancel::CancelToken;
use super::params::{BiasMode, RunParameters};

/// Number of background reads averaged by auto-bias
pub const CALIBRATION_WINDOW: usize = 10;

/// Effective bias for the run.
///
/// # Returns
/// * `Ok(Some(bias))` - Bias to add to every sample
/// * `Ok(None)` - Cancelled during the calibration window
/// * `Err(AcquisitionError::HardwareUnavailable)` - Channel could not be
///   opened or read
pub fn resolve_bias(
    params: &RunParameters,
    driver: &dyn DaqDriver,
    cancel: &CancelToken,
) -> Result<Option<f64>, AcquisitionError> {
    match params.bias_mode() {
        BiasMode::Off => Ok(Some(0.0)),
        BiasMode::Manual(bias) => Ok(Some(bias)),
        BiasMode::Auto => {
            info!("Auto-acquiring bias");
            let wait = params.wait_duration()?;
            let mut channel = ChannelGuard::open(driver, &params.device, &params.input_port)?;
            let readings = match read_background(&mut channel, wait, cancel)? {
                Some(readings) => readings,
                None => return Ok(None),
            };
            channel.close()?;
            Ok(Some(bias_from_background(&readings)))
        }
    }
}

fn read_background(
    channel: &mut ChannelGuard,
    wait: Duration,
    cancel: &CancelToken,
) -> Result<Option<Vec<f64>>, AcquisitionError> {
    let mut readings = Vec::with_capacity(CALIBRATION_WINDOW);

    for i in 0..CALIBRATION_WINDOW {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let value = channel.read_one()?;
        debug!("Background read {}/{}: {}", i + 1, CALIBRATION_WINDOW, value);
        readings.push(value);

        if i + 1 < CALIBRATION_WINDOW && cancel.wait_timeout(wait) {
            return Ok(None);
        }
    }

    Ok(Some(readings))
}

/// Negated arithmetic mean of the background readings.
pub fn bias_from_background(readings: &[f64]) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let sum: f64 = readings.iter().sum();
    -(sum / readings.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDriver;

    fn auto_params() -> RunParameters {
        RunParameters {
            data_bias_toggle: true,
            auto_bias_toggle: true,
            wait_time: 0.0,
            ..RunParameters::default()
        }
    }

    #[test]
    fn test_bias_from_background() {
        assert!((bias_from_background(&[0.5; 10]) - -0.5).abs() < 1e-12);
        assert!((bias_from_background(&[1.0, 2.0, 3.0, 4.0]) - -2.5).abs() < 1e-12);
        assert_eq!(bias_from_background(&[]), 0.0);
    }

    #[test]
    fn test_off_and_manual_touch_no_hardware() {
        let driver = ScriptedDriver::new(vec![]);
        let cancel = CancelToken::new();

        let off = RunParameters {
            manual_data_bias: 3.0,
            auto_bias_toggle: true,
            ..RunParameters::default()
        };
        assert_eq!(resolve_bias(&off, &driver, &cancel).unwrap(), Some(0.0));

        let manual = RunParameters {
            data_bias_toggle: true,
            manual_data_bias: 3.0,
            ..RunParameters::default()
        };
        assert_eq!(resolve_bias(&manual, &driver, &cancel).unwrap(), Some(3.0));
        assert_eq!(driver.open_count(), 0);
    }

    #[test]
    fn test_auto_reads_exactly_window() {
        let mut script = vec![0.5; CALIBRATION_WINDOW];
        script.push(99.0);
        let driver = ScriptedDriver::new(script);

        let bias = resolve_bias(&auto_params(), &driver, &CancelToken::new())
            .unwrap()
            .unwrap();
        assert!((bias - -0.5).abs() < 1e-12);
        assert_eq!(driver.read_count(), CALIBRATION_WINDOW);
        assert_eq!(driver.remaining_readings(), 1);
        assert_eq!(driver.open_channels(), 0);
    }

    #[test]
    fn test_auto_open_failure() {
        let driver = ScriptedDriver::new(vec![0.5; 10]).fail_open();
        let result = resolve_bias(&auto_params(), &driver, &CancelToken::new());
        assert!(matches!(
            result,
            Err(AcquisitionError::HardwareUnavailable { .. })
        ));
    }

    #[test]
    fn test_auto_read_failure_releases_channel() {
        let driver = ScriptedDriver::new(vec![0.5; 10]).fail_read_at(4);
        let result = resolve_bias(&auto_params(), &driver, &CancelToken::new());
        assert!(result.is_err());
        assert_eq!(driver.open_channels(), 0);
    }

    #[test]
    fn test_auto_cancelled_before_window() {
        let driver = ScriptedDriver::new(vec![0.5; 10]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = resolve_bias(&auto_params(), &driver, &cancel).unwrap();
        assert_eq!(result, None);
        assert_eq!(driver.read_count(), 0);
        assert_eq!(driver.open_channels(), 0);
    }

    #[test]
    fn test_auto_unrepresentable_wait_fails_before_opening() {
        let driver = ScriptedDriver::new(vec![0.5; 10]);
        let params = RunParameters {
            wait_time: 1e30,
            ..auto_params()
        };
        let result = resolve_bias(&params, &driver, &CancelToken::new());
        assert!(matches!(
            result,
            Err(AcquisitionError::InvalidParameters { .. })
        ));
        assert_eq!(driver.open_count(), 0);
    }
}
