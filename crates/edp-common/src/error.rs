//! Error types for EDP

use thiserror::Error;

/// Result type alias for EDP operations
pub type Result<T> = std::result::Result<T, EdpError>;

/// Main error type for EDP
#[derive(Error, Debug)]
pub enum EdpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EdpError::Config("PORT must be numeric".to_string());
        assert_eq!(err.to_string(), "Configuration error: PORT must be numeric");

        let err = EdpError::Parse("failed to read CSV header row".to_string());
        assert_eq!(err.to_string(), "Parse error: failed to read CSV header row");
    }
}
