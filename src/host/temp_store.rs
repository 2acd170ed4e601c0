// TempStore - directory holding one temporary results file per run

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AcquisitionError;

pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    /// Wipe any files left from a previous session and recreate `root`.
    pub fn new(root: PathBuf) -> Result<Self, AcquisitionError> {
        if root.exists() {
            info!("Clearing old temp files in {}", root.display());
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_for(&self, run_id: u64) -> PathBuf {
        self.root.join(format!("run_{:04}.dat", run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clears_previous_session() {
        let root = std::env::temp_dir().join(format!("daq_recorder_temp_{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("stale.dat"), "old").unwrap();

        let store = TempStore::new(root.clone()).unwrap();
        assert!(store.root().exists());
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
        assert_eq!(store.file_for(7), root.join("run_0007.dat"));
    }
}
