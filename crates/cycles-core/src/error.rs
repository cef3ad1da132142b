use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the spend-cycles crates.
///
/// Per-record problems (bad dates, bad amounts) are never errors: they are
/// counted during enrichment. Only configuration and I/O failures surface here.
#[derive(Error, Debug)]
pub enum CycleError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A CSV statement could not be read or written.
    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// Billing cycles must start on a day that exists in every month.
    #[error("Invalid cycle start day {0}: must be between 1 and 28")]
    InvalidStartDay(u32),

    /// A cycle span whose last month precedes its first month.
    #[error("Invalid cycle span: {first} is after {last}")]
    InvalidSpan { first: String, last: String },

    /// Classification was requested with no rules at all.
    #[error("Category rule list is empty")]
    EmptyRuleSet,

    /// A rule that could never match anything.
    #[error("Category rule \"{0}\" has no usable keywords")]
    EmptyRule(String),

    /// A timezone name that is not a recognised IANA identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The statement path does not exist.
    #[error("Statement path not found: {0}")]
    PathNotFound(PathBuf),

    /// No CSV statements were found under the given directory.
    #[error("No CSV files found in {0}")]
    NoStatementFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background worker panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the spend-cycles crates.
pub type Result<T> = std::result::Result<T, CycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CycleError::FileRead {
            path: PathBuf::from("/statements/nubank.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/statements/nubank.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_invalid_start_day() {
        let err = CycleError::InvalidStartDay(31);
        assert_eq!(
            err.to_string(),
            "Invalid cycle start day 31: must be between 1 and 28"
        );
    }

    #[test]
    fn test_error_display_empty_rule() {
        let err = CycleError::EmptyRule("Lazer".to_string());
        assert_eq!(err.to_string(), "Category rule \"Lazer\" has no usable keywords");
    }

    #[test]
    fn test_error_display_csv() {
        let err = CycleError::Csv {
            path: PathBuf::from("extrato.csv"),
            message: "unequal lengths".to_string(),
        };
        assert_eq!(err.to_string(), "CSV error in extrato.csv: unequal lengths");
    }

    #[test]
    fn test_error_display_no_statement_files() {
        let err = CycleError::NoStatementFiles(PathBuf::from("/empty/dir"));
        assert_eq!(err.to_string(), "No CSV files found in /empty/dir");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CycleError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: CycleError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
