use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("dataset {id} not available under {root:?}: {reason}")]
    Provider {
        id: u32,
        root: PathBuf,
        reason: String,
    },
    #[error("schema error on column {column:?}: {reason}")]
    Schema { column: String, reason: String },
    #[error("{count} record(s) have no `num` value, heart disease label cannot be derived")]
    MissingLabel { count: usize },
    #[error("group {group:?} has {actual} observation(s), at least {required} required")]
    InsufficientData {
        group: String,
        required: usize,
        actual: usize,
    },
    #[error("degenerate input for {test}: {reason}")]
    Degenerate { test: &'static str, reason: String },
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
    #[error("unsupported export target {path:?}")]
    ExportFormat { path: PathBuf },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl From<statrs::StatsError> for AnalysisError {
    fn from(e: statrs::StatsError) -> Self {
        AnalysisError::Distribution(e.to_string())
    }
}

impl AnalysisError {
    pub fn schema(column: &str, reason: impl Into<String>) -> Self {
        AnalysisError::Schema {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole run rather than a single analysis.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AnalysisError::InsufficientData { .. }
                | AnalysisError::Degenerate { .. }
                | AnalysisError::Distribution(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
