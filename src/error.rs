//! Error taxonomy shared by the reader, writer, merge engine and transform
//! pipeline.
//!
//! Every failure surfaces as a single [`Error`] value. [`Error::kind()`]
//! collapses the variants into the four categories callers branch on:
//! configuration, parse, malformed row and I/O.

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Parse,
    MalformedRow,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("Column '{column}' not found in {context} header")]
    MissingColumn { column: String, context: String },

    #[error("Failed to parse '{value}' as a number in column '{column}' at line {line} of {path:?}")]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error("Line {line} of {path:?} is not valid {encoding}")]
    Decode {
        path: PathBuf,
        line: u64,
        encoding: &'static str,
    },

    #[error("Invalid number literal '{value}' for column '{column}'")]
    InvalidLiteral { column: String, value: String },

    #[error("Line {line} of {path:?} has {found} field(s) but the header has {expected}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::MissingColumn { .. } | Error::InvalidLiteral { .. } => {
                ErrorKind::Config
            }
            Error::Parse { .. } | Error::Decode { .. } => ErrorKind::Parse,
            Error::MalformedRow { .. } => ErrorKind::MalformedRow,
            Error::Io { .. } => ErrorKind::Io,
            Error::Csv { source, .. } => match source.kind() {
                csv::ErrorKind::UnequalLengths { .. } => ErrorKind::MalformedRow,
                _ => ErrorKind::Io,
            },
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}
