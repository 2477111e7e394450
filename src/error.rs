//! Error types for the Parlance library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`NluError`] enum. The training loop and the classification
//! post-processing steps are infallible and return plain values. Errors come
//! from I/O, (de)serialization, analysis steps, invalid configuration and
//! the worker thread used for training.
//!
//! # Examples
//!
//! ```
//! use parlance::error::{NluError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(NluError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Parlance operations.
#[derive(Error, Debug)]
pub enum NluError {
    /// I/O errors (model files, corpus files, configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Analysis-related errors (tokenization, normalization, pipeline steps)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Model import/export errors
    #[error("Model error: {0}")]
    Model(String),

    /// Training errors, including a failed or panicked training worker
    #[error("Training error: {0}")]
    Training(String),

    /// Entity registration errors (invalid regex, unknown entity kind)
    #[error("Entity error: {0}")]
    Entity(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with NluError.
pub type Result<T> = std::result::Result<T, NluError>;

impl NluError {
    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        NluError::Analysis(msg.into())
    }

    /// Create a new model error.
    pub fn model<S: Into<String>>(msg: S) -> Self {
        NluError::Model(msg.into())
    }

    /// Create a new training error.
    pub fn training<S: Into<String>>(msg: S) -> Self {
        NluError::Training(msg.into())
    }

    /// Create a new entity error.
    pub fn entity<S: Into<String>>(msg: S) -> Self {
        NluError::Entity(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        NluError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        NluError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        NluError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = NluError::training("worker stopped");
        assert_eq!(error.to_string(), "Training error: worker stopped");

        let error = NluError::entity("bad regex");
        assert_eq!(error.to_string(), "Entity error: bad regex");

        let error = NluError::invalid_config("missing locale");
        assert_eq!(
            error.to_string(),
            "Error: Invalid configuration: missing locale"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let nlu_error = NluError::from(io_error);

        match nlu_error {
            NluError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
