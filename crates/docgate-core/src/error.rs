use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("File already exists: {0}")]
    NameConflict(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Helper for creating name validation errors
    ///
    /// # Example
    /// ```
    /// use docgate_core::Error;
    /// let err = Error::invalid_name("../etc/passwd", "path separators are not allowed");
    /// assert_eq!(err.code(), "invalid_name");
    /// ```
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Helper for creating configuration errors
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Stable, machine-readable code reported to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidName { .. } => "invalid_name",
            Error::NameConflict(_) => "name_conflict",
            Error::NotFound(_) => "not_found",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::ConversionFailed(_) => "conversion_failed",
            Error::IoError(_) => "io_failure",
            Error::Config(_) | Error::SerializationError(_) => "internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::NameConflict("a.txt".into()).code(), "name_conflict");
        assert_eq!(Error::NotFound("a.txt".into()).code(), "not_found");
        assert_eq!(
            Error::UnsupportedFormat("image/png".into()).code(),
            "unsupported_format"
        );
        assert_eq!(
            Error::ConversionFailed("boom".into()).code(),
            "conversion_failed"
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(Error::from(io).code(), "io_failure");
    }

    #[test]
    fn test_invalid_name_message() {
        let err = Error::invalid_name("..", "reserved name");
        assert_eq!(err.to_string(), "Invalid file name '..': reserved name");
        assert!(!err.is_not_found());
    }
}
