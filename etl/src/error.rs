//! Error types for the orders ETL pipeline.
//!
//! - [`CsvError`] - Reading and decoding the input table
//! - [`ConfigError`] - Loading and validating [`crate::config::EtlConfig`]
//! - [`PipelineError`] - Top-level run errors, with a process exit code
//!
//! Rows dropped by the transformation stages are not errors: they are
//! recorded as [`crate::models::Exclusion`]s in the run report.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading the input table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded with the detected encoding.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// Malformed record.
    #[error("Invalid CSV format at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A column the transformer reads is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::Io(io),
            csv::ErrorKind::Utf8 { err, .. } => CsvError::Encoding(err.to_string()),
            other => CsvError::Parse {
                line,
                message: format!("{:?}", other),
            },
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`crate::config::EtlConfig`].
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Allow-list entry is not a two-letter country code.
    #[error("Invalid country code in allow-list: '{0}'")]
    InvalidCountryCode(String),

    /// Allow-list has no entries.
    #[error("Country allow-list is empty")]
    EmptyAllowList,

    /// VAT rate is negative or not finite.
    #[error("Invalid VAT rate: {0}")]
    InvalidVatRate(f64),

    /// High-value threshold is not finite.
    #[error("Invalid high-value threshold: {0}")]
    InvalidThreshold(f64),

    /// Placeholder email is blank.
    #[error("Default email must not be empty")]
    EmptyDefaultEmail,

    /// Environment variable holds an unusable value.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level run errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file does not exist. Nothing is written.
    #[error("Input file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Input could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Configuration is invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Output could not be written.
    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    /// Run report could not be written.
    #[error("Failed to write report: {0}")]
    Report(String),
}

impl PipelineError {
    /// Process exit code for this error.
    ///
    /// A missing input exits with `2` so callers can tell it apart from
    /// other failures, which exit with `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::SourceNotFound(_) => 2,
            _ => 1,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let config_err = ConfigError::InvalidCountryCode("DEU".into());
        let pipeline_err: PipelineError = config_err.into();
        assert!(pipeline_err.to_string().contains("DEU"));
    }

    #[test]
    fn test_exit_codes() {
        let missing = PipelineError::SourceNotFound(PathBuf::from("eu_orders.csv"));
        assert_eq!(missing.exit_code(), 2);
        assert!(missing.to_string().contains("eu_orders.csv"));

        let other: PipelineError = CsvError::NoHeaders.into();
        assert_eq!(other.exit_code(), 1);
    }

    #[test]
    fn test_missing_column_format() {
        let err = CsvError::MissingColumn("Country".into());
        assert_eq!(err.to_string(), "Missing required column: Country");
    }
}
