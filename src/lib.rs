// DAQ Recorder Core - analog input acquisition with bias calibration
// Software-timed sampling, per-run results files and a live event stream

// Module declarations
pub mod config;
pub mod error;
pub mod hardware;
pub mod host;
pub mod procedure;
pub mod results;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{AcquisitionError, ConfigError, ErrorCode};
pub use host::{RunEvent, RunHost, RunOutcome, RunReport};
pub use procedure::{AcquisitionProcedure, CancelToken, Procedure, RunParameters, SamplePoint};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
