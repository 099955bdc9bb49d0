//! Core type system and error handling for treesync
//!
//! This crate provides the foundational types, error handling, and collaborator
//! traits shared by every treesync crate. It includes:
//!
//! - **Error handling**: One error enum covering path, I/O, consistency and lock failures
//! - **Core types**: The difference status taxonomy, comparison policy and copy statistics
//! - **Traits**: The progress, log and name-filter seams the core talks to
//! - **Configuration**: Validated value types such as [`BufferSize`]
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use treesync_types::{DiffStatus, Result};
//!
//! fn flip(status: DiffStatus) -> Result<DiffStatus> {
//!     status.invert()
//! }
//!
//! assert_eq!(flip(DiffStatus::CopyToB).unwrap(), DiffStatus::RemoveFromA);
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::BufferSize;
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_copy_has_no_rate() {
        let stats = CopyStats::new();
        assert_eq!(stats.bytes_copied, 0);
        assert_eq!(stats.transfer_rate(), 0.0);
    }

    #[test]
    fn test_per_node_copies_accumulate() {
        let file = CopyStats {
            files_copied: 1,
            bytes_copied: 5,
            ..CopyStats::default()
        };
        let directory = CopyStats {
            files_copied: 3,
            directories_created: 2,
            bytes_copied: 1500,
            duration: std::time::Duration::from_secs(1),
        };

        let mut run = CopyStats::new();
        run.merge(&file);
        run.merge(&directory);
        assert_eq!(run.files_copied, 4);
        assert_eq!(run.directories_created, 2);
        assert_eq!(run.bytes_copied, 1505);
        assert_eq!(run.transfer_rate(), 1505.0);
    }

    #[test]
    fn test_error_severity() {
        let io_error = Error::io(
            "/tmp/a",
            std::io::Error::new(std::io::ErrorKind::NotFound, "test"),
        );
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let config_error = Error::config("invalid ignore pattern");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert!(!config_error.is_recoverable());

        assert!(Error::inconsistent("orphan node").is_fatal());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_buffer_size_validation() {
        assert!(BufferSize::new(4096).is_ok());
        assert!(BufferSize::new(65536).is_ok());
        assert!(BufferSize::new(1024).is_err()); // Too small
        assert!(BufferSize::new(5000).is_err()); // Not power of two
    }
}
