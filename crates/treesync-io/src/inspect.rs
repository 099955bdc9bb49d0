//! Read-only inspection helpers: sizes, timestamps and content comparison

use crate::{CopyBuffer, FileCopier};
use filetime::FileTime;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;
use treesync_types::{Error, Result};
use walkdir::WalkDir;

impl FileCopier {
    /// Sum of the sizes of all files at or below `path`
    ///
    /// A plain file yields its own length.
    pub async fn total_bytes(path: &Path) -> Result<u64> {
        let root = path.to_path_buf();
        tokio::task::spawn_blocking(move || sum_file_sizes(&root))
            .await
            .map_err(|e| Error::io(path, std::io::Error::other(e)))?
    }

    /// Byte-for-byte comparison of two files
    pub async fn content_equals(&self, a: &Path, b: &Path) -> Result<bool> {
        let len_a = Self::entry_metadata(a).await?.len();
        let len_b = Self::entry_metadata(b).await?.len();
        if len_a != len_b {
            return Ok(false);
        }

        let mut file_a = fs::File::open(a).await.map_err(|e| Error::io(a, e))?;
        let mut file_b = fs::File::open(b).await.map_err(|e| Error::io(b, e))?;
        let mut buffer_a = CopyBuffer::new(self.buffer_size());
        let mut buffer_b = CopyBuffer::new(self.buffer_size());

        loop {
            let read_a = read_full(&mut file_a, buffer_a.as_mut_slice())
                .await
                .map_err(|e| Error::io(a, e))?;
            let read_b = read_full(&mut file_b, buffer_b.as_mut_slice())
                .await
                .map_err(|e| Error::io(b, e))?;

            if read_a != read_b || buffer_a.filled(read_a) != buffer_b.filled(read_b) {
                return Ok(false);
            }
            if read_a == 0 {
                return Ok(true);
            }
        }
    }

    /// Last modification time of `path`
    pub async fn modified(path: &Path) -> Result<FileTime> {
        let metadata = Self::entry_metadata(path).await?;
        Ok(FileTime::from_last_modification_time(&metadata))
    }

    /// Metadata of `path`, following symbolic links
    ///
    /// A link whose target is missing is described by the link itself, so it
    /// shows up as a plain file.
    pub async fn entry_metadata(path: &Path) -> Result<Metadata> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(metadata),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let link = fs::symlink_metadata(path)
                    .await
                    .map_err(|_| Error::io(path, e))?;
                debug!("'{}' is a dangling link", path.display());
                Ok(link)
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Whether `path` is a symbolic link pointing nowhere
    pub fn is_dangling_link(path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
            && std::fs::metadata(path).is_err()
    }
}

fn sum_file_sizes(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => match e.path() {
                Some(path) if FileCopier::is_dangling_link(path) => {
                    let link = std::fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
                    total += link.len();
                    continue;
                }
                path => {
                    let path = path.unwrap_or(root).to_path_buf();
                    return Err(Error::io(path, e.into()));
                }
            },
        };
        if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .map_err(|e| Error::io(entry.path(), e.into()))?;
            total += metadata.len();
        }
    }
    Ok(total)
}

/// Fill `buf` as far as the reader allows; short only at end of file
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}
