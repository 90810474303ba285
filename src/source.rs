//! Seekable byte sources the player streams from.

use crate::WavError;

/// A seekable, block oriented byte source such as a file on a FAT volume.
///
/// `read` must fill `buf` completely unless the end of the source is reached.
/// A shorter result anywhere else is treated as a fault by the player.
pub trait ByteSource {
    /// Error reported by the underlying storage.
    type Error: core::fmt::Debug;

    /// Move the read position back to offset 0.
    fn rewind(&mut self) -> Result<(), Self::Error> {
        self.seek(0)
    }

    /// Move the read position to an absolute byte offset.
    fn seek(&mut self, offset: u32) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes and return the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Current absolute read position.
    fn position(&mut self) -> Result<u32, Self::Error>;
}

/// Log a storage error and report it as [`WavError::SourceRead`].
pub(crate) fn read_fault<E: core::fmt::Debug>(e: E) -> WavError {
    log::warn!("byte source error: {:?}", e);
    WavError::SourceRead
}

/// Error type for [`SliceSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SliceSourceError {
    #[error("Seek offset {0} is past the end of the data.")]
    SeekOutOfBounds(u32),
}

/// Byte source over an in-memory byte array, e.g. a WAV file embedded with `include_bytes!`.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceSource<'a> {
    /// * 'data' - WAV file byte array
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, position: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    type Error = SliceSourceError;

    fn seek(&mut self, offset: u32) -> Result<(), Self::Error> {
        if offset as usize > self.data.len() {
            return Err(SliceSourceError::SeekOutOfBounds(offset));
        }
        self.position = offset as usize;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = &self.data[self.position..];
        let n = buf.len().min(remaining.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn position(&mut self) -> Result<u32, Self::Error> {
        Ok(self.position as u32)
    }
}

/// Byte source over anything implementing [`std::io::Read`] and [`std::io::Seek`].
#[cfg(any(test, feature = "std"))]
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

#[cfg(any(test, feature = "std"))]
impl<R: std::io::Read + std::io::Seek> IoSource<R> {
    pub fn new(inner: R) -> Self {
        IoSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(any(test, feature = "std"))]
impl<R: std::io::Read + std::io::Seek> ByteSource for IoSource<R> {
    type Error = std::io::Error;

    fn seek(&mut self, offset: u32) -> Result<(), Self::Error> {
        self.inner.seek(std::io::SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    // std readers may return early, so keep reading until the buffer is full or EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn position(&mut self) -> Result<u32, Self::Error> {
        let position = self.inner.stream_position()?;
        u32::try_from(position)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "offset exceeds u32"))
    }
}
