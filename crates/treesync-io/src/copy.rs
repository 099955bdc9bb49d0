//! Buffered, cancellable file and directory copying

use crate::CopyBuffer;
use filetime::FileTime;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use treesync_types::{BufferSize, CopyStats, Error, Result};

/// Receives the size of every chunk written during a copy
///
/// Returning an error, typically [`Error::Cancelled`], aborts the copy. The
/// file being written at that moment is deleted before the error propagates.
pub trait ChunkObserver: Send {
    /// `bytes` more bytes were written to the target
    fn chunk_copied(&mut self, bytes: u64) -> Result<()>;
}

/// Observer that accepts every chunk
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChunkObserver for NoopObserver {
    fn chunk_copied(&mut self, _bytes: u64) -> Result<()> {
        Ok(())
    }
}

/// File copier streaming through a fixed-size buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCopier {
    buffer_size: BufferSize,
}

impl FileCopier {
    /// Create a copier with the default buffer size
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a copier with a custom buffer size
    pub fn with_buffer_size(buffer_size: BufferSize) -> Self {
        Self { buffer_size }
    }

    /// Configured buffer size
    pub fn buffer_size(&self) -> BufferSize {
        self.buffer_size
    }

    /// Copy `source` (file or directory tree) to `target`
    ///
    /// An existing `target` is removed first. Copied files receive the source
    /// modification time; directories receive theirs after their children
    /// are written.
    pub async fn copy<O>(&self, source: &Path, target: &Path, observer: &mut O) -> Result<CopyStats>
    where
        O: ChunkObserver + ?Sized,
    {
        let start_time = Instant::now();

        if entry_exists(target).await? {
            Self::remove(target).await?;
        }

        let mut buffer = CopyBuffer::new(self.buffer_size);
        let mut stats = CopyStats::new();
        self.copy_entry(source, target, &mut buffer, observer, &mut stats)
            .await?;

        stats.duration = start_time.elapsed();
        debug!(
            "Copied '{}' -> '{}': {} files, {} bytes in {:?}",
            source.display(),
            target.display(),
            stats.files_copied,
            stats.bytes_copied,
            stats.duration
        );
        Ok(stats)
    }

    /// Remove a file or a whole directory tree
    ///
    /// A path that no longer exists is not an error.
    pub async fn remove(path: &Path) -> Result<()> {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to remove at '{}'", path.display());
                return Ok(());
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(path)
                .await
                .map_err(|e| Error::io(path, e))
        } else {
            fs::remove_file(path).await.map_err(|e| Error::io(path, e))
        }
    }

    fn copy_entry<'a, O>(
        &'a self,
        source: &'a Path,
        target: &'a Path,
        buffer: &'a mut CopyBuffer,
        observer: &'a mut O,
        stats: &'a mut CopyStats,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
    where
        O: ChunkObserver + ?Sized,
    {
        Box::pin(async move {
            let metadata = fs::metadata(source)
                .await
                .map_err(|e| Error::io(source, e))?;

            if !metadata.is_dir() {
                let copied = copy_file(source, target, buffer, observer).await?;
                stats.files_copied += 1;
                stats.bytes_copied += copied;
                return Ok(());
            }

            fs::create_dir(target)
                .await
                .map_err(|e| Error::io(target, e))?;
            stats.directories_created += 1;

            let mut entries = fs::read_dir(source)
                .await
                .map_err(|e| Error::io(source, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::io(source, e))?
            {
                let child_source = entry.path();
                let child_target = target.join(entry.file_name());
                self.copy_entry(&child_source, &child_target, buffer, observer, stats)
                    .await?;
            }

            // Children bump the directory mtime, so it is restored last
            filetime::set_file_mtime(target, FileTime::from_last_modification_time(&metadata))
                .map_err(|e| Error::io(target, e))?;
            Ok(())
        })
    }
}

async fn copy_file<O>(
    source: &Path,
    target: &Path,
    buffer: &mut CopyBuffer,
    observer: &mut O,
) -> Result<u64>
where
    O: ChunkObserver + ?Sized,
{
    debug!("Copying file '{}'", source.display());

    match stream_file(source, target, buffer, observer).await {
        Ok(copied) => {
            let metadata = fs::metadata(source)
                .await
                .map_err(|e| Error::io(source, e))?;
            filetime::set_file_mtime(target, FileTime::from_last_modification_time(&metadata))
                .map_err(|e| Error::io(target, e))?;
            Ok(copied)
        }
        Err(error) => {
            if error.is_cancelled() {
                info!("Aborted copy process - deleting file '{}'", target.display());
            } else {
                warn!(
                    "Copy of '{}' failed, deleting partial file '{}': {}",
                    source.display(),
                    target.display(),
                    error
                );
            }
            discard_partial(target).await;
            Err(error)
        }
    }
}

/// Streams `source` into a freshly created `target`. Both handles are
/// closed when this returns, successfully or not.
async fn stream_file<O>(
    source: &Path,
    target: &Path,
    buffer: &mut CopyBuffer,
    observer: &mut O,
) -> Result<u64>
where
    O: ChunkObserver + ?Sized,
{
    let mut reader = fs::File::open(source)
        .await
        .map_err(|e| Error::io(source, e))?;
    let mut writer = fs::File::create(target)
        .await
        .map_err(|e| Error::io(target, e))?;

    let mut copied = 0u64;
    loop {
        let read = reader
            .read(buffer.as_mut_slice())
            .await
            .map_err(|e| Error::io(source, e))?;
        if read == 0 {
            break;
        }

        writer
            .write_all(buffer.filled(read))
            .await
            .map_err(|e| Error::io(target, e))?;
        copied += read as u64;
        if let Err(error) = observer.chunk_copied(read as u64) {
            // Let the queued write land before the handle is dropped
            writer.flush().await.ok();
            return Err(error);
        }
    }

    writer.flush().await.map_err(|e| Error::io(target, e))?;
    Ok(copied)
}

async fn discard_partial(target: &Path) {
    if let Err(e) = fs::remove_file(target).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not delete partial file '{}': {}", target.display(), e);
        }
    }
}

async fn entry_exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Cancels once more than `limit` bytes were reported
    struct CancelAfter {
        seen: u64,
        limit: u64,
    }

    impl ChunkObserver for CancelAfter {
        fn chunk_copied(&mut self, bytes: u64) -> Result<()> {
            self.seen += bytes;
            if self.seen > self.limit {
                Err(Error::Cancelled)
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<u64>,
    }

    impl ChunkObserver for Recorder {
        fn chunk_copied(&mut self, bytes: u64) -> Result<()> {
            self.chunks.push(bytes);
            Ok(())
        }
    }

    fn past(seconds: u64) -> FileTime {
        FileTime::from_system_time(SystemTime::now() - Duration::from_secs(seconds))
    }

    #[tokio::test]
    async fn test_copy_file_preserves_content_and_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let target = temp_dir.path().join("target.txt");
        std::fs::write(&source, b"hello treesync").unwrap();
        filetime::set_file_mtime(&source, past(3600)).unwrap();

        let stats = FileCopier::new()
            .copy(&source, &target, &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.bytes_copied, 14);
        assert_eq!(std::fs::read(&target).unwrap(), b"hello treesync");
        let source_mtime =
            FileTime::from_last_modification_time(&std::fs::metadata(&source).unwrap());
        let target_mtime =
            FileTime::from_last_modification_time(&std::fs::metadata(&target).unwrap());
        assert_eq!(source_mtime, target_mtime);
    }

    #[tokio::test]
    async fn test_copy_reports_every_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("big.bin");
        let target = temp_dir.path().join("big.copy");
        std::fs::write(&source, vec![7u8; 10_000]).unwrap();

        let mut recorder = Recorder::default();
        let copier = FileCopier::with_buffer_size(BufferSize::new(4096).unwrap());
        copier.copy(&source, &target, &mut recorder).await.unwrap();

        assert_eq!(recorder.chunks.iter().sum::<u64>(), 10_000);
        assert!(recorder.chunks.iter().all(|&chunk| chunk <= 4096));
    }

    #[tokio::test]
    async fn test_copy_replaces_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("new.txt");
        let target = temp_dir.path().join("old");
        std::fs::write(&source, b"new").unwrap();
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("leftover.txt"), b"old").unwrap();

        FileCopier::new()
            .copy(&source, &target, &mut NoopObserver)
            .await
            .unwrap();

        assert!(target.is_file());
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_copy_directory_tree() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("dst");
        std::fs::create_dir_all(source.join("nested/deeper")).unwrap();
        std::fs::write(source.join("a.txt"), b"a").unwrap();
        std::fs::write(source.join("nested/b.txt"), b"bb").unwrap();
        std::fs::write(source.join("nested/deeper/c.txt"), b"ccc").unwrap();
        filetime::set_file_mtime(source.join("nested"), past(7200)).unwrap();

        let stats = FileCopier::new()
            .copy(&source, &target, &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(stats.files_copied, 3);
        assert_eq!(stats.directories_created, 3);
        assert_eq!(stats.bytes_copied, 6);
        assert_eq!(std::fs::read(target.join("nested/deeper/c.txt")).unwrap(), b"ccc");

        let source_mtime = FileTime::from_last_modification_time(
            &std::fs::metadata(source.join("nested")).unwrap(),
        );
        let target_mtime = FileTime::from_last_modification_time(
            &std::fs::metadata(target.join("nested")).unwrap(),
        );
        assert_eq!(source_mtime, target_mtime);
    }

    #[tokio::test]
    async fn test_cancelled_copy_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("large.bin");
        let target = temp_dir.path().join("large.copy");
        std::fs::write(&source, vec![1u8; 64 * 1024]).unwrap();

        let copier = FileCopier::with_buffer_size(BufferSize::new(4096).unwrap());
        let mut observer = CancelAfter {
            seen: 0,
            limit: 8192,
        };
        let error = copier
            .copy(&source, &target, &mut observer)
            .await
            .unwrap_err();

        assert!(error.is_cancelled());
        assert!(!target.exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_cancelled_directory_copy_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("dst");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("only.bin"), vec![2u8; 32 * 1024]).unwrap();

        let copier = FileCopier::with_buffer_size(BufferSize::new(4096).unwrap());
        let mut observer = CancelAfter {
            seen: 0,
            limit: 4096,
        };
        let error = copier
            .copy(&source, &target, &mut observer)
            .await
            .unwrap_err();

        assert!(error.is_cancelled());
        assert!(!target.join("only.bin").exists());
    }

    #[tokio::test]
    async fn test_copy_missing_source_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("missing.txt");
        let target = temp_dir.path().join("target.txt");

        let error = FileCopier::new()
            .copy(&source, &target, &mut NoopObserver)
            .await
            .unwrap_err();

        match error {
            Error::Io { path, .. } => assert_eq!(path, source),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_remove_file_and_tree() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        let dir = temp_dir.path().join("dir");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub/inner.txt"), b"y").unwrap();

        FileCopier::remove(&file).await.unwrap();
        FileCopier::remove(&dir).await.unwrap();
        FileCopier::remove(&temp_dir.path().join("never-existed"))
            .await
            .unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
    }
}
