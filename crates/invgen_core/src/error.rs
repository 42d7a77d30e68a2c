//! Error types for inventory generation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors that can occur while generating an inventory.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Host source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("No valid hosts found in {0}")]
    NoValidHosts(String),

    #[error("Invalid host data: {0}")]
    InvalidHost(String),

    #[error("Missing required CSV columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

impl InventoryError {
    /// Wrap an OS error raised while writing `path`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = InventoryError::MissingColumns(vec!["environment".into(), "hostname".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required CSV columns: environment, hostname"
        );
    }

    #[test]
    fn test_glob_pattern_error_converts() {
        let err: InventoryError = glob::Pattern::new("[").unwrap_err().into();
        assert!(matches!(err, InventoryError::Glob(_)));
        assert!(err.to_string().starts_with("Invalid glob pattern:"));
    }

    #[test]
    fn test_write_wraps_os_error() {
        let err = InventoryError::write(
            "inventory/production.yml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to write inventory/production.yml: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
