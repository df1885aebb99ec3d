//! Stream ingestion: read an untrusted source fully into memory, bounded.
//!
//! ## Why buffer everything?
//!
//! The decode pipeline needs random access (DDS mip offsets, PNG chunks), and
//! the format is unknown until the header has been sniffed. So the whole
//! source is read up front, but only after its reported size has been checked
//! against the ceiling. A host that thumbnails arbitrary files must never let
//! a crafted stream drive an unbounded allocation.

use crate::error::ThumbError;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// A readable source that can report its total size.
///
/// Implemented for every `Read + Seek` type: the size is found by seeking to
/// the end, and the stream is rewound to the start before reading.
pub trait SourceStream {
    /// Total number of bytes the stream holds.
    fn total_size(&mut self) -> io::Result<u64>;

    /// Read up to `buf.len()` bytes, returning how many were read. Stops
    /// early only at end of stream.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Read + Seek + ?Sized> SourceStream for T {
    fn total_size(&mut self) -> io::Result<u64> {
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(0))?;
        Ok(len)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// The fully buffered source asset.
///
/// Immutable once populated. Its length is exactly the size the stream
/// reported at ingestion time.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SourceBuffer {
    bytes: Vec<u8>,
}

impl SourceBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for SourceBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Read `stream` completely, refusing anything larger than `limit` bytes.
///
/// On any failure the partially filled buffer is dropped before returning.
pub fn ingest<S>(stream: &mut S, limit: u64) -> Result<SourceBuffer, ThumbError>
where
    S: SourceStream + ?Sized,
{
    let size = stream
        .total_size()
        .map_err(|source| ThumbError::SizeUnavailable { source })?;

    if size == 0 {
        return Err(ThumbError::EmptySource);
    }
    if size > limit {
        return Err(ThumbError::SourceTooLarge { size, limit });
    }
    let len = usize::try_from(size).map_err(|_| ThumbError::SourceTooLarge { size, limit })?;

    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| ThumbError::AllocationFailed { bytes: size })?;
    bytes.resize(len, 0);

    let read = stream
        .read_into(&mut bytes)
        .map_err(|source| ThumbError::ReadFailed { source })?;
    if read != len {
        return Err(ThumbError::ShortRead {
            expected: size,
            actual: read as u64,
        });
    }

    debug!("Ingested {} bytes from source stream", len);
    Ok(SourceBuffer { bytes })
}
