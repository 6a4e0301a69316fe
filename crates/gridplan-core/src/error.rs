//! Error taxonomy for planning-model builds.
//!
//! Every failure a build can surface is a [`BuildError`] variant. Each variant
//! carries the dataset name and the raw identifier that triggered it so the
//! offending source row can be located. [`ErrorKind`] is the serializable
//! discriminant used when the same condition is downgraded to a gap entry
//! instead of aborting the build.
//!
//! # Example
//!
//! ```
//! use gridplan_core::{BuildError, ErrorKind};
//!
//! let err = BuildError::UnclassifiedTechnology {
//!     dataset: "capacity".into(),
//!     technology: "FutureFusion-9000".into(),
//! };
//! assert_eq!(err.kind(), ErrorKind::UnclassifiedTechnology);
//! assert!(err.to_string().contains("FutureFusion-9000"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::GapReport;

/// Discriminant shared by [`BuildError`] and gap entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFile,
    SchemaMismatch,
    AmbiguousMapping,
    UnclassifiedTechnology,
    SeriesLength,
    UnresolvedYear,
    ReferentialIntegrity,
    DuplicateConflict,
    InvalidValue,
    ValidationFailure,
    Timeout,
    Io,
    Parse,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingFile => "MissingFileError",
            ErrorKind::SchemaMismatch => "SchemaMismatchError",
            ErrorKind::AmbiguousMapping => "AmbiguousMappingError",
            ErrorKind::UnclassifiedTechnology => "UnclassifiedTechnologyError",
            ErrorKind::SeriesLength => "SeriesLengthError",
            ErrorKind::UnresolvedYear => "UnresolvedYearError",
            ErrorKind::ReferentialIntegrity => "ReferentialIntegrityError",
            ErrorKind::DuplicateConflict => "DuplicateConflictError",
            ErrorKind::InvalidValue => "InvalidValueError",
            ErrorKind::ValidationFailure => "ValidationFailure",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Io => "IoError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Config => "ConfigError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while resolving, reading, building or validating a system.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A required dataset has no file matching its path pattern.
    #[error("dataset '{dataset}': no file matches '{pattern}'")]
    MissingFile { dataset: String, pattern: String },

    /// Declared columns or dimensions are absent from the file.
    #[error("dataset '{dataset}' ({path}): expected {expected:?}, missing {missing:?}, found {actual:?}")]
    SchemaMismatch {
        dataset: String,
        path: String,
        expected: Vec<String>,
        missing: Vec<String>,
        actual: Vec<String>,
    },

    /// A path pattern matched several files and no disambiguation rule is set.
    #[error("dataset '{dataset}': pattern '{pattern}' matches {} files ({})", .matches.len(), .matches.join(", "))]
    AmbiguousMapping {
        dataset: String,
        pattern: String,
        matches: Vec<String>,
    },

    #[error("dataset '{dataset}': no classification rule matches technology '{technology}'")]
    UnclassifiedTechnology { dataset: String, technology: String },

    #[error("dataset '{dataset}': series for '{owner}' has {actual} samples, expected {expected}")]
    SeriesLength {
        dataset: String,
        owner: String,
        expected: usize,
        actual: usize,
    },

    /// Requested solve/weather year is not present in the source.
    #[error("dataset '{dataset}': no data for {}", describe_years(.solve_year, .weather_year))]
    UnresolvedYear {
        dataset: String,
        solve_year: Option<i32>,
        weather_year: Option<i32>,
    },

    #[error("dataset '{dataset}': {entity}: {detail}")]
    ReferentialIntegrity {
        dataset: String,
        entity: String,
        detail: String,
    },

    /// Two rows share a key but disagree on their values.
    #[error("dataset '{dataset}': conflicting duplicate rows for '{key}': {detail}")]
    DuplicateConflict {
        dataset: String,
        key: String,
        detail: String,
    },

    #[error("Unknown {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// A parsed value is outside its physical range.
    #[error("dataset '{dataset}': {entity}: {detail}")]
    OutOfRange {
        dataset: String,
        entity: String,
        detail: String,
    },

    #[error("validation failed: {0}")]
    ValidationFailure(GapReport),

    #[error("build timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset '{dataset}'{}: {message}", .line.map(|l| format!(" line {l}")).unwrap_or_default())]
    Parse {
        dataset: String,
        line: Option<u64>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

fn describe_years(solve_year: &Option<i32>, weather_year: &Option<i32>) -> String {
    match (*solve_year, *weather_year) {
        (Some(s), Some(w)) => format!("solve year {s}, weather year {w}"),
        (Some(s), None) => format!("solve year {s}"),
        (None, Some(w)) => format!("weather year {w}"),
        (None, None) => "unspecified year".to_string(),
    }
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::MissingFile { .. } => ErrorKind::MissingFile,
            BuildError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            BuildError::AmbiguousMapping { .. } => ErrorKind::AmbiguousMapping,
            BuildError::UnclassifiedTechnology { .. } => ErrorKind::UnclassifiedTechnology,
            BuildError::SeriesLength { .. } => ErrorKind::SeriesLength,
            BuildError::UnresolvedYear { .. } => ErrorKind::UnresolvedYear,
            BuildError::ReferentialIntegrity { .. } => ErrorKind::ReferentialIntegrity,
            BuildError::DuplicateConflict { .. } => ErrorKind::DuplicateConflict,
            BuildError::InvalidValue { .. } | BuildError::OutOfRange { .. } => {
                ErrorKind::InvalidValue
            }
            BuildError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            BuildError::Timeout { .. } => ErrorKind::Timeout,
            BuildError::Io(_) => ErrorKind::Io,
            BuildError::Parse { .. } => ErrorKind::Parse,
            BuildError::Config(_) => ErrorKind::Config,
        }
    }

    /// Errors that abort the build even in non-strict mode.
    pub fn is_always_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AmbiguousMapping
                | ErrorKind::ValidationFailure
                | ErrorKind::Timeout
                | ErrorKind::Io
                | ErrorKind::Parse
                | ErrorKind::Config
        )
    }

    pub fn parse(dataset: &str, line: Option<u64>, message: impl Into<String>) -> Self {
        BuildError::Parse {
            dataset: dataset.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using BuildError.
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_dataset_and_identifier() {
        let err = BuildError::ReferentialIntegrity {
            dataset: "transmission".into(),
            entity: "p1||p1".into(),
            detail: "link connects a region to itself".into(),
        };
        let text = err.to_string();
        assert!(text.contains("transmission"));
        assert!(text.contains("p1||p1"));
    }

    #[test]
    fn unresolved_year_reports_both_years() {
        let err = BuildError::UnresolvedYear {
            dataset: "load_profiles".into(),
            solve_year: Some(2030),
            weather_year: Some(2012),
        };
        assert!(err.to_string().contains("solve year 2030, weather year 2012"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BuildError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.is_always_fatal());
    }

    #[test]
    fn ambiguous_mapping_is_always_fatal() {
        let err = BuildError::AmbiguousMapping {
            dataset: "capacity".into(),
            pattern: "inputs/cap_*.csv".into(),
            matches: vec!["cap_a.csv".into(), "cap_b.csv".into()],
        };
        assert!(err.is_always_fatal());
        assert!(err.to_string().contains("2 files"));
    }

    #[test]
    fn data_gaps_are_not_always_fatal() {
        let err = BuildError::MissingFile {
            dataset: "emissions".into(),
            pattern: "emissions.csv".into(),
        };
        assert!(!err.is_always_fatal());
        assert_eq!(err.kind().as_str(), "MissingFileError");
    }

    #[test]
    fn invalid_value_message() {
        let err = BuildError::InvalidValue {
            field: "reserve type",
            value: "spinning_reserve".into(),
        };
        assert_eq!(err.to_string(), "Unknown reserve type: 'spinning_reserve'");
    }
}
