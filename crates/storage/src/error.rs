//! Error types for the storage layer.

use std::fmt;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage and format failures.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    Io { message: String },
    /// A snapshot could not be (de)serialized.
    Serialization { message: String },
    /// No parser for this format tag.
    UnsupportedFormat { format: String },
    /// The payload parsed but does not describe rows.
    InvalidData { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { message } => write!(f, "I/O error: {}", message),
            StorageError::Serialization { message } => {
                write!(f, "Serialization error: {}", message)
            }
            StorageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported format: {}", format)
            }
            StorageError::InvalidData { message } => write!(f, "Invalid data: {}", message),
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    /// Creates an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        StorageError::InvalidData {
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        StorageError::UnsupportedFormat {
            format: format.into(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<StorageError> for reshape_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedFormat { .. } | StorageError::InvalidData { .. } => {
                reshape_core::Error::format(err.to_string())
            }
            StorageError::Io { .. } | StorageError::Serialization { .. } => {
                reshape_core::Error::persistence(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_into_core() {
        let err: reshape_core::Error = StorageError::unsupported_format("gexf").into();
        assert!(matches!(err, reshape_core::Error::Format { .. }));

        let err: reshape_core::Error = StorageError::Io {
            message: "denied".into(),
        }
        .into();
        assert!(matches!(err, reshape_core::Error::Persistence { .. }));
    }
}
