use thiserror::Error;

/// Storage-specific error types for the dock state file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the state file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State file content is not valid JSON for the persisted state
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Configuration("empty path".to_string());
        assert_eq!(err.to_string(), "Configuration error: empty path");

        let err: StorageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
