use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AcquisitionError;
use crate::procedure::{Procedure, SamplePoint};

use super::{DATA_LINE, ENTRY_PREFIX, METADATA_LINE, PARAMETERS_LINE, PROCEDURE_PREFIX};

/// Incremental writer for one run's results file.
pub struct ResultsWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ResultsWriter {
    /// Create the file and write the header for `procedure`.
    ///
    /// Metadata entries are whatever the procedure reports at this point,
    /// so the writer is created once `startup` has run.
    pub fn create(path: &Path, procedure: &dyn Procedure) -> Result<Self, AcquisitionError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{}<{}>", PROCEDURE_PREFIX, procedure.name())?;
        writeln!(out, "{}", PARAMETERS_LINE)?;
        for (label, value) in procedure.parameter_entries() {
            writeln!(out, "{}{}: {}", ENTRY_PREFIX, label, value)?;
        }
        writeln!(out, "{}", METADATA_LINE)?;
        for (label, value) in procedure.metadata_entries() {
            writeln!(out, "{}{}: {}", ENTRY_PREFIX, label, value)?;
        }
        writeln!(out, "{}", DATA_LINE)?;
        writeln!(out, "{}", procedure.columns().join(","))?;
        out.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            out,
        })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, point: &SamplePoint) -> Result<(), AcquisitionError> {
        writeln!(self.out, "{},{:?}", point.index, point.value)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf, AcquisitionError> {
        self.out.flush()?;
        Ok(self.path)
    }
}
