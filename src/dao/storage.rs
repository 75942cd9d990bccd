use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable description, including the backend's own message.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document does not match the expected shape.
    #[error("corrupt document `{collection}/{id}`")]
    Corrupt {
        /// Collection holding the document.
        collection: String,
        /// Document id.
        id: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corrupt-document error.
    pub fn corrupt(
        collection: impl Into<String>,
        id: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        StorageError::Corrupt {
            collection: collection.into(),
            id: id.into(),
            source,
        }
    }

    /// Full message chain, used to recognise network failures.
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}
