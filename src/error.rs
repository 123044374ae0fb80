//! Global error handling for simos
//!
//! This module provides a centralized error type for everything outside
//! the namespace store and the engine's per-process faults: configuration,
//! workload loading and the command-line front end.

use std::io;
use thiserror::Error;

use crate::namespace::NamespaceError;
use crate::workload::WorkloadError;

/// Global error type for simos operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Namespace store errors
    #[error("Namespace error: {0}")]
    Namespace(#[from] NamespaceError),

    /// Workload definition errors
    #[error("Workload error: {0}")]
    Workload(#[from] WorkloadError),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unexpected error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Specialized Result type for simos operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Creates a SimError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::SimError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for adding context to errors
pub trait ResultExt<T, E> {
    /// Add additional context to an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: std::error::Error + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| {
            let context = f();
            SimError::Unexpected(format!("{}: {}", context, e))
        })
    }
}

// Lets `main` keep returning io::Result
impl From<SimError> for io::Error {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
