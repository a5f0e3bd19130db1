//! Error types for buildgrid-core

use thiserror::Error;

/// The kind of a named collection held by a data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Queue,
    Map,
    Set,
    Topic,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Map => write!(f, "map"),
            Self::Set => write!(f, "set"),
            Self::Topic => write!(f, "topic"),
        }
    }
}

/// Core error type for buildgrid operations
#[derive(Debug, Error)]
pub enum Error {
    /// A collection with this name exists but holds a different element type
    #[error("{kind} '{name}' already exists with a different element type")]
    TypeMismatch {
        /// Collection name
        name: String,
        /// Collection kind
        kind: CollectionKind,
    },

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Notification worker pool could not be started
    #[error("Executor error: {0}")]
    Executor(String),
}

/// Result type alias for buildgrid-core operations
pub type Result<T> = std::result::Result<T, Error>;
