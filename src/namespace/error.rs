/*!
 * Error types for namespace store operations
 */

use thiserror::Error;

/// Errors that can occur while querying or mutating the namespace
#[derive(Error, Debug)]
pub enum NamespaceError {
    /// No node at the given path (or one of its parents is missing)
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// A directory was required but a file was found
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but a directory was found
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// The final path segment already names a child
    #[error("File exists: {0}")]
    AlreadyExists(String),

    /// Directory removal attempted on a directory with children
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Empty, "." or ".." used as the name of a new node
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// The node is the root or the current working directory
    #[error("Device or resource busy: {0}")]
    Busy(String),

    /// Creating the node would exceed the maximum tree depth
    #[error("Maximum depth exceeded: {0}")]
    TooDeep(String),

    /// IO error while saving or loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data is not valid JSON or does not match the node schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted data parsed but violates a structural rule
    #[error("Malformed namespace data: {0}")]
    Malformed(String),
}

/// Specialized Result type for namespace operations
pub type NamespaceResult<T> = Result<T, NamespaceError>;
