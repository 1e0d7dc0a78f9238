use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Could not open trace file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Trace file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("File {path:?} has an invalid number of columns ({columns}). Expected an odd number of columns (bin and two columns for each channel)")]
    BadColumnCount { path: PathBuf, columns: usize },
    #[error("File {path:?} has a ragged row at line {line}: found {found} columns, expected {expected}")]
    RaggedRow {
        path: PathBuf,
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("File {path:?} could not parse value {value:?} at line {line}")]
    BadValue {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("File {path:?} has {rows} rows; more than {min} are required for a signal region", min=NOISE_REGION_ROWS)]
    TooFewRows { path: PathBuf, rows: usize },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PeakError {
    #[error("Signal peak is at the edge of the data for columns {0} and {1}")]
    PeakAtEdge(usize, usize),
    #[error("Could not find at least two peaks in the summed signal of columns {0} and {1} (found {2})")]
    TooFewPeaks(usize, usize, usize),
    #[error("Found more than two peaks in the summed signal of columns {0} and {1} (found {2})")]
    TooManyPeaks(usize, usize, usize),
    #[error("Summed signal of columns {0} and {1} is too short to search past the first {skip} samples", skip=REFERENCE_SKIP_SAMPLES)]
    TraceTooShort(usize, usize),
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{0}")]
    Trace(#[from] TraceError),
    #[error("{0}")]
    Peak(#[from] PeakError),
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Failed to process file for {identifier}: {source}")]
    Module {
        identifier: String,
        #[source]
        source: ModuleError,
    },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Invalid file identifier '{0}'. Expected format is PMA0-PMA9 or PMC0-PMC9")]
    InvalidIdentifier(String),
    #[error("File {path:?} for {identifier} does not exist")]
    MissingFile { identifier: String, path: PathBuf },
    #[error("File {path:?} for {identifier} is empty")]
    EmptyFile { identifier: String, path: PathBuf },
    #[error("Reference module {pm} not in files for dataset {date}")]
    MissingReferenceModule { pm: String, date: String },
    #[error("Dataset failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReferenceError {
    #[error("Reference channels of dataset {date} contain insufficient data for calculation. Gaussian means: {gaussian}, Weighted means: {weighted}")]
    InsufficientData {
        date: String,
        gaussian: usize,
        weighted: usize,
    },
    #[error("Reference channels of dataset {0} contain no data for calculation")]
    NoData(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AgeingError {
    #[error("Reference {statistic} mean of dataset {date} is zero; cannot compute ageing factors")]
    ZeroReferenceMean { date: String, statistic: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML/JSON: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("date field missing in input dataset {0}")]
    MissingDate(usize),
    #[error("Config failed due to dataset error: {0}")]
    DatasetError(#[from] DatasetError),
}

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Results failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Results failed to convert to JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Results failed to write CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Results failed to format timestamp: {0}")]
    TimeError(#[from] time::error::Format),
}

/// Errors which abort the processing of a single dataset
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Extraction failed: {0}")]
    Extractor(#[from] ExtractorError),
    #[error("Reference aggregation failed: {0}")]
    Reference(#[from] ReferenceError),
    #[error("Ageing calculation failed: {0}")]
    Ageing(#[from] AgeingError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processing dataset {date} failed: {source}")]
    Dataset {
        date: String,
        #[source]
        source: StageError,
    },
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed because no valid datasets were found in the configuration")]
    NoDatasets,
    #[error("Processor was cancelled before completion")]
    Cancelled,
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
