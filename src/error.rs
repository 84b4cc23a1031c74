use thiserror::Error;

/// Library error types
#[derive(Debug, Error)]
pub enum AstroError {
    /// Bad arguments: out-of-range values, unsupported formats or datasets,
    /// missing columns.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote service answered but signalled a failure.
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Transport failures and timeouts.
    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AstroError>;

impl AstroError {
    /// Error for a column that the table does not carry.
    pub fn missing_column(name: &str) -> Self {
        AstroError::Validation(format!(
            "Column '{}' does not exist in the DataFrame.",
            name
        ))
    }
}

/// Convert config::ConfigError to AstroError
impl From<config::ConfigError> for AstroError {
    fn from(err: config::ConfigError) -> Self {
        AstroError::Config(err.to_string())
    }
}

/// Arrow kernels only fail on internal shape mismatches
impl From<datafusion::arrow::error::ArrowError> for AstroError {
    fn from(err: datafusion::arrow::error::ArrowError) -> Self {
        AstroError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let err = AstroError::missing_column("Column3");
        assert!(matches!(err, AstroError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation error: Column 'Column3' does not exist in the DataFrame."
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AstroError = io.into();
        assert!(matches!(err, AstroError::Io(_)));
    }
}
