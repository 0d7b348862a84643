//! Error types for the data preparation pipeline.
//!
//! Every failure a stage can produce is a [`PrepError`]. Values that fail
//! numeric coercion are not errors: they become nulls and are counted in the
//! normalization report instead.
//!
//! Errors serialize as `{code, message}` so they can be written into JSON
//! reports alongside the run summary.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the preparation pipeline.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The input header does not match the configured schema.
    #[error("Schema mismatch: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A numeric column has no observed values to impute from.
    #[error("Insufficient data in column '{column}': no non-missing values to impute from")]
    InsufficientData { column: String },

    /// Data does not line up with a fitted transform.
    #[error("Encoding mismatch for column '{column}': {reason}")]
    EncodingMismatch { column: String, reason: String },

    /// Missing cells survived to a point where none are allowed.
    #[error("Data integrity check failed: {missing} missing cell(s) in [{}]", .columns.join(", "))]
    DataIntegrity {
        missing: usize,
        columns: Vec<String>,
    },

    /// Appending a column would shadow an existing one.
    #[error("Column '{0}' already exists in the target table")]
    DuplicateColumn(String),

    /// A pipeline stage aborted the run.
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<PrepError>,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an error as the failure of a named stage.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        PrepError::StageFailed {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, used in JSON reports and CLI exit messages.
    ///
    /// Wrapping variants report the code of the error they carry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::EncodingMismatch { .. } => "ENCODING_MISMATCH",
            Self::DataIntegrity { .. } => "DATA_INTEGRITY",
            Self::DuplicateColumn(_) => "DUPLICATE_COLUMN",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::StageFailed { source, .. } | Self::WithContext { source, .. } => {
                source.error_code()
            }
        }
    }

    /// Name of the stage that failed, if the error went through a stage boundary.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. } => Some(stage.as_str()),
            Self::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// Check if the error can be fixed by changing the input or configuration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidConfig(_) | Self::SchemaMismatch { .. } | Self::ColumnNotFound(_) => true,
            Self::StageFailed { source, .. } | Self::WithContext { source, .. } => {
                source.is_recoverable()
            }
            _ => false,
        }
    }
}

impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preparation operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Io(e).with_context(context))
    }
}
