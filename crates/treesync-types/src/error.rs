//! Error types and handling for treesync
//!
//! Every failure the core can surface is a variant of [`Error`]. Two variants are
//! programmer-error tripwires ([`Error::InconsistentState`] and
//! [`Error::LockMisuse`]) and are never retried; [`Error::Cancelled`] is the
//! normal unwind path of a cooperative cancellation and not a failure at all.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - an expected outcome, nothing to report
    Low,
    /// Medium severity - the current run is aborted, the user may retry
    Medium,
    /// High severity - the request itself is invalid
    High,
    /// Critical severity - a bug in the caller's or the core's control flow
    Critical,
}

/// Main error type for treesync operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// A root path is invalid or a path cannot be mapped onto a root
    #[error("Path error for '{path}': {message}")]
    Path {
        /// The offending path
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// Listing, reading, writing or deleting failed
    #[error("I/O error at '{path}': {message}")]
    Io {
        /// Path the failed operation touched
        path: PathBuf,
        /// Error message from the I/O operation
        message: String,
    },

    /// The difference tree or a status reached a state that must not exist
    #[error("Inconsistent state: {message}")]
    InconsistentState {
        /// Description of the violated invariant
        message: String,
    },

    /// The run lock was released without being held
    #[error("Lock misuse: {message}")]
    LockMisuse {
        /// Description of the misuse
        message: String,
    },

    /// Write permission could not be toggled for a timestamp update
    #[error("Permission error for '{path}': {message}")]
    Permission {
        /// Path whose permissions could not be changed
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Another comparison or synchronization currently holds the run lock
    #[error("Another comparison or synchronization is already running")]
    Busy,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Path validation and mapping errors
    Path,
    /// I/O related errors
    Io,
    /// Broken internal invariants
    InconsistentState,
    /// Run lock misuse
    LockMisuse,
    /// Permission toggling errors
    Permission,
    /// Cancellation
    Cancelled,
    /// Rejected because another run is active
    Busy,
    /// Configuration errors
    Config,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Path { .. } => ErrorKind::Path,
            Self::Io { .. } => ErrorKind::Io,
            Self::InconsistentState { .. } => ErrorKind::InconsistentState,
            Self::LockMisuse { .. } => ErrorKind::LockMisuse,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Busy => ErrorKind::Busy,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::Path { .. } | Self::Permission { .. } | Self::Config { .. } => {
                ErrorSeverity::High
            }
            Self::InconsistentState { .. } | Self::LockMisuse { .. } => ErrorSeverity::Critical,
            Self::Cancelled | Self::Busy => ErrorSeverity::Low,
        }
    }

    /// Whether this error is a programmer-error tripwire that must be surfaced as fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Whether the user may simply try the same request again
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Busy => true,
            Self::Path { .. }
            | Self::InconsistentState { .. }
            | Self::LockMisuse { .. }
            | Self::Permission { .. }
            | Self::Cancelled
            | Self::Config { .. } => false,
        }
    }

    /// Whether this is the cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a new I/O error for `path`
    pub fn io<P: Into<PathBuf>>(path: P, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create a new path error
    pub fn path<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new inconsistent-state error
    pub fn inconsistent<S: Into<String>>(message: S) -> Self {
        Self::InconsistentState {
            message: message.into(),
        }
    }

    /// Create a new lock misuse error
    pub fn lock_misuse<S: Into<String>>(message: S) -> Self {
        Self::LockMisuse {
            message: message.into(),
        }
    }

    /// Create a new permission error
    pub fn permission<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Permission {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
