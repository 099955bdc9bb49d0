//! Fixed-size copy buffers

use treesync_types::BufferSize;

/// Reusable fixed-size byte buffer used for streaming copies and comparisons
#[derive(Debug)]
pub struct CopyBuffer {
    data: Vec<u8>,
}

impl CopyBuffer {
    /// Allocate a zeroed buffer of the given size
    pub fn new(size: BufferSize) -> Self {
        Self {
            data: vec![0; size.get()],
        }
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whole buffer for reading into
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The first `len` bytes, typically what the last read produced
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new(BufferSize::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_uses_configured_size() {
        let buffer = CopyBuffer::new(BufferSize::new(8192).unwrap());
        assert_eq!(buffer.capacity(), 8192);
        assert_eq!(CopyBuffer::default().capacity(), BufferSize::DEFAULT);
    }

    #[test]
    fn test_filled_is_clamped() {
        let mut buffer = CopyBuffer::new(BufferSize::new(4096).unwrap());
        buffer.as_mut_slice()[..3].copy_from_slice(b"abc");
        assert_eq!(buffer.filled(3), b"abc");
        assert_eq!(buffer.filled(10_000).len(), 4096);
    }
}
