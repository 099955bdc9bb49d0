//! treesync testing suite
//!
//! This crate provides the end-to-end integration tests and the benchmarks for
//! the treesync workspace, together with the fixtures they share.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Fixtures used across the integration tests and the benchmarks.
pub mod test_utils;
