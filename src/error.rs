use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unresolvable relation/table/column name or an operator combination the
    /// target dialect cannot express. Fatal at build/render time, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A bound value failed its column type's encode step.
    #[error("Encoding error for column \"{column}\": {message}")]
    Encoding { column: String, message: String },

    /// Failure returned by the external driver during an issued statement.
    /// Propagated unmodified; a failed round trip aborts the whole fetch.
    #[error("Execution error: {0}")]
    Execution(String),

    /// No rows returned when at least one was expected.
    #[error("No rows found")]
    NotFound,

    /// Error mapping driver rows back into typed results.
    #[error("Mapping error: {0}")]
    Mapping(String),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn encoding(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encoding {
            column: column.into(),
            message: message.into(),
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        Error::Mapping(message.into())
    }
}

/// Result type for query building and execution.
pub type Result<T> = std::result::Result<T, Error>;
