use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading a tabular source into memory.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source not found: {path}")]
    Missing { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: declared column `{column}` is not present")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}:{line}: column `{column}` has invalid {kind} value `{value}`")]
    Malformed {
        path: PathBuf,
        line: u64,
        column: String,
        kind: &'static str,
        value: String,
    },
}

/// Failures while writing a report artifact.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chart `{title}` has no data to draw")]
    EmptyView { title: String },

    #[error("Chart `{title}` has a non-finite value for `{label}`")]
    NonFinite { title: String, label: String },

    #[error("Chart `{title}` has no value for `{label}`")]
    MissingValue { title: String, label: String },

    #[error("Failed to draw {path}: {message}")]
    Backend { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Cannot reduce `{measure}`: no records to aggregate")]
    EmptyAggregation { measure: String },

    #[error("{metric} is undefined: {reason}")]
    UndefinedMetric { metric: String, reason: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ReportError {
    pub fn undefined(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::UndefinedMetric {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ReportError::Config {
            message: message.into(),
        }
    }

    /// Process exit code for the CLI: 2 for bad configuration, 3 for
    /// unreadable input, 1 for everything that fails while computing or writing.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReportError::Config { .. } | ReportError::UnknownColumn(_) => 2,
            ReportError::Load(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
