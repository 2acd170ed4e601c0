//! Tabular results files.
//!
//! One file per run: a `#`-prefixed header (procedure, parameters, metadata)
//! followed by CSV rows. Rows are flushed as they arrive so a run that
//! fails halfway still leaves every emitted sample on disk.

mod reader;
mod writer;

pub use reader::{ResultsFile, ResultsSummary};
pub use writer::ResultsWriter;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AcquisitionError;

pub(crate) const PROCEDURE_PREFIX: &str = "#Procedure: ";
pub(crate) const PARAMETERS_LINE: &str = "#Parameters:";
pub(crate) const METADATA_LINE: &str = "#Metadata:";
pub(crate) const DATA_LINE: &str = "#Data:";
pub(crate) const ENTRY_PREFIX: &str = "#\t";

/// Copy a run's temporary file to its final destination.
///
/// The temporary file is left untouched. A `None` destination means the
/// operator declined to pick one and is not an error.
///
/// # Returns
/// * `Ok(Some(path))` - Data copied to `path`
/// * `Ok(None)` - Nothing saved
pub fn save_as(temp_file: &Path, destination: Option<&Path>) -> Result<Option<PathBuf>, AcquisitionError> {
    let Some(destination) = destination else {
        info!("Data not saved");
        return Ok(None);
    };

    info!("Saving data to {}", destination.display());
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::copy(temp_file, destination)?;
    Ok(Some(destination.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "daq_recorder_results_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_as_copies_and_keeps_source() {
        let dir = scratch_dir("copy");
        let temp = dir.join("run.tmp");
        fs::write(&temp, "Sample,Y\n1,0.5\n").unwrap();

        let dest = dir.join("out").join("final.dat");
        let saved = save_as(&temp, Some(&dest)).unwrap();

        assert_eq!(saved, Some(dest.clone()));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "Sample,Y\n1,0.5\n");
        assert!(temp.exists());
    }

    #[test]
    fn test_save_as_without_destination_is_noop() {
        let dir = scratch_dir("noop");
        let temp = dir.join("run.tmp");
        fs::write(&temp, "x").unwrap();

        assert_eq!(save_as(&temp, None).unwrap(), None);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[test]
    fn test_save_as_missing_source_is_storage_error() {
        let dir = scratch_dir("missing");
        let result = save_as(&dir.join("absent.tmp"), Some(&dir.join("dest.dat")));
        assert!(matches!(result, Err(AcquisitionError::Storage { .. })));
    }
}
