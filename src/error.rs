use crate::hash::HashError;
use crate::index::IndexError;
use crate::report::ReportError;
use crate::temporal::TemporalError;
use crate::video::ExtractionError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a forensic run
#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot hash video: {0}")]
    VideoHash(#[from] HashError),

    #[error("Frame extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("No frames extracted from {0}")]
    NoFrames(PathBuf),

    #[error("Frame indexing failed: {0}")]
    Index(#[from] IndexError),

    #[error("Temporal analysis failed: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Report rendering failed: {0}")]
    Report(#[from] ReportError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ForensicsError>;
