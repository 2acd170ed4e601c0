use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::AcquisitionError;
use crate::procedure::SamplePoint;

use super::{DATA_LINE, ENTRY_PREFIX, METADATA_LINE, PARAMETERS_LINE, PROCEDURE_PREFIX};

/// Parsed results file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsFile {
    pub procedure: String,
    pub parameters: Vec<(String, String)>,
    pub metadata: Vec<(String, String)>,
    pub columns: Vec<String>,
    pub points: Vec<SamplePoint>,
}

/// Descriptive statistics over a file's values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub bias: Option<f64>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Parameters,
    Metadata,
    Columns,
    Rows,
}

impl ResultsFile {
    pub fn load(path: &Path) -> Result<Self, AcquisitionError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, AcquisitionError> {
        let mut file = ResultsFile {
            procedure: String::new(),
            parameters: Vec::new(),
            metadata: Vec::new(),
            columns: Vec::new(),
            points: Vec::new(),
        };
        let mut section = Section::Preamble;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if let Some(name) = line.strip_prefix(PROCEDURE_PREFIX) {
                file.procedure = name.trim_start_matches('<').trim_end_matches('>').to_string();
            } else if line == PARAMETERS_LINE {
                section = Section::Parameters;
            } else if line == METADATA_LINE {
                section = Section::Metadata;
            } else if line == DATA_LINE {
                section = Section::Columns;
            } else if let Some(entry) = line.strip_prefix(ENTRY_PREFIX) {
                let (label, value) = entry.split_once(": ").unwrap_or((entry, ""));
                let pair = (label.to_string(), value.to_string());
                match section {
                    Section::Parameters => file.parameters.push(pair),
                    Section::Metadata => file.metadata.push(pair),
                    _ => return Err(malformed(line_no, "header entry outside a section")),
                }
            } else if line.is_empty() {
                continue;
            } else {
                match section {
                    Section::Columns => {
                        file.columns = line.split(',').map(str::to_string).collect();
                        section = Section::Rows;
                    }
                    Section::Rows => file.points.push(parse_row(line_no, line)?),
                    _ => return Err(malformed(line_no, "data before the #Data: marker")),
                }
            }
        }

        if file.columns.is_empty() {
            return Err(malformed(0, "missing column header"));
        }
        Ok(file)
    }

    pub fn parameter(&self, label: &str) -> Option<&str> {
        lookup(&self.parameters, label)
    }

    pub fn metadata_value(&self, label: &str) -> Option<&str> {
        lookup(&self.metadata, label)
    }

    pub fn bias(&self) -> Option<f64> {
        self.metadata_value("Data Bias")
            .and_then(|value| value.parse().ok())
    }

    pub fn summary(&self) -> ResultsSummary {
        let values: Vec<f64> = self.points.iter().map(|point| point.value).collect();
        let count = values.len();
        let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
        let min = values.iter().copied().reduce(f64::min);
        let max = values.iter().copied().reduce(f64::max);

        ResultsSummary {
            count,
            mean,
            min,
            max,
            bias: self.bias(),
        }
    }
}

fn lookup<'a>(entries: &'a [(String, String)], label: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(key, _)| key == label)
        .map(|(_, value)| value.as_str())
}

fn parse_row(line_no: usize, line: &str) -> Result<SamplePoint, AcquisitionError> {
    let (index, value) = line
        .split_once(',')
        .ok_or_else(|| malformed(line_no, "expected two columns"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| malformed(line_no, "sample index is not an integer"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| malformed(line_no, "value is not a number"))?;
    Ok(SamplePoint::new(index, value))
}

fn malformed(line_no: usize, reason: &str) -> AcquisitionError {
    AcquisitionError::Storage {
        details: format!("malformed results file at line {}: {}", line_no + 1, reason),
    }
}
