//! Configuration management for treesync
//!
//! Settings are layered: built-in defaults, then configuration files (YAML,
//! TOML or JSON, chosen by extension), then environment variables prefixed
//! with `TREESYNC` and using `__` as the section separator
//! (`TREESYNC_COMPARISON__ALWAYS_VERIFY_CONTENT=true`).
//!
//! # Examples
//!
//! ```rust
//! use treesync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("treesync.yaml")
//!     .add_env_prefix("TREESYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Buffer size: {}", config.io.buffer_size.get());
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use treesync_types::{BufferSize, ComparePolicy};

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for treesync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How files with the same name are compared
    pub comparison: ComparisonConfig,
    /// Which names are excluded from comparison
    pub filter: FilterConfig,
    /// Copy buffer configuration
    pub io: IoConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Session behaviour
    pub session: SessionConfig,
}

/// File comparison flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Treat same-size files with differing timestamps as timestamp-only drift
    /// without reading their content
    pub assume_equal_if_same_size: bool,
    /// Compare content even when size and timestamp are equal
    pub always_verify_content: bool,
    /// Equalize timestamps while scanning instead of reporting them
    pub implicit_timestamp_sync: bool,
}

impl ComparisonConfig {
    /// The comparison policy these flags describe
    pub fn policy(&self) -> ComparePolicy {
        ComparePolicy {
            assume_equal_if_same_size: self.assume_equal_if_same_size,
            always_verify_content: self.always_verify_content,
            implicit_timestamp_sync: self.implicit_timestamp_sync,
        }
    }
}

impl From<ComparisonConfig> for ComparePolicy {
    fn from(config: ComparisonConfig) -> Self {
        config.policy()
    }
}

/// Name filter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Regular expressions; a name matching any of them in full is ignored
    pub ignore_patterns: Vec<String>,
}

/// I/O configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Buffer size used for copying and content comparison
    pub buffer_size: BufferSize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            colored_output: true,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Compare both locations again once a synchronization finishes
    pub rescan_after_sync: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rescan_after_sync: true,
        }
    }
}
