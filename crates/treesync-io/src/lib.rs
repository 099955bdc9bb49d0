//! File I/O primitives for treesync
//!
//! This crate provides the filesystem mutations and inspections the
//! synchronization engine is built on:
//!
//! - **Buffered copying**: Files stream through a fixed-size [`CopyBuffer`]
//! - **Cancellation**: A [`ChunkObserver`] sees every chunk and may abort the copy;
//!   the partially written file is deleted before the error propagates
//! - **Timestamps**: Copies keep the source modification time, [`FileCopier::touch`]
//!   equalizes two files
//! - **Inspection**: Recursive byte totals and byte-for-byte content comparison
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treesync_io::{FileCopier, NoopObserver};
//!
//! # async fn example() -> treesync_types::Result<()> {
//! let copier = FileCopier::new();
//! let stats = copier
//!     .copy(Path::new("a/docs"), Path::new("b/docs"), &mut NoopObserver)
//!     .await?;
//! println!("Copied {} bytes", stats.bytes_copied);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod copy;
pub mod inspect;
pub mod timestamps;

pub use buffer::CopyBuffer;
pub use copy::{ChunkObserver, FileCopier, NoopObserver};
