//! Error type shared by the resolver, loader, pipeline and exporters.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = StudyError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("file not found: '{name}' in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("school '{school}' has no target concentration configured")]
    MissingMapping { school: String },

    #[error("no {what} loaded")]
    EmptyDataset { what: &'static str },

    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },

    #[error("unknown school '{school}'")]
    UnknownSchool { school: String },

    #[error("column '{column}' has no defined value in any row")]
    UndefinedColumn { column: String },

    #[error("target concentration for '{school}' must be positive, got {value}")]
    InvalidConcentration { school: String, value: f64 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("sheet '{sheet}' row {row} column '{column}': {message}")]
    Sheet {
        sheet: String,
        row: usize,
        column: String,
        message: String,
    },

    #[error("cannot write workbook {}: {source}", path.display())]
    Xlsx {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StudyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StudyError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StudyError::Csv {
            path: path.into(),
            source,
        }
    }
}
