//! Error types for the dds-thumbnail library.
//!
//! Two error types reflect two owners:
//!
//! * [`ThumbError`] covers everything the provider itself can reject: a bad
//!   stream, a call out of protocol order, a decoded image that violates the
//!   bitmap contract. Returned from [`crate::ThumbnailProvider`] methods.
//!
//! * [`DecodeError`] holds failures owned by the decode pipeline (unknown
//!   header, truncated mip data, unsupported block format). The provider
//!   never translates these; they surface unchanged inside
//!   [`ThumbError::Decode`].
//!
//! Every failure is returned to the caller immediately. The host is expected
//! to fall back to a generic icon; there is no partial thumbnail.

use thiserror::Error;

use crate::decode::PixelFormat;

/// All errors returned by the thumbnail provider.
#[derive(Debug, Error)]
pub enum ThumbError {
    // ── Caller errors ─────────────────────────────────────────────────────
    /// A caller-supplied value was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Ingestion errors ──────────────────────────────────────────────────
    /// The stream could not report its total size.
    #[error("Source stream size is unavailable: {source}")]
    SizeUnavailable {
        #[source]
        source: std::io::Error,
    },

    /// The stream reported a size of zero.
    #[error("Source stream is empty")]
    EmptySource,

    /// The stream is larger than the configured ceiling.
    #[error("Source is {size} bytes, exceeding the {limit}-byte limit")]
    SourceTooLarge { size: u64, limit: u64 },

    /// The stream yielded a different number of bytes than it reported.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    /// The stream read itself failed.
    #[error("Failed to read source stream: {source}")]
    ReadFailed {
        #[source]
        source: std::io::Error,
    },

    // ── Protocol errors ───────────────────────────────────────────────────
    /// A thumbnail was requested before a successful `initialize`.
    #[error("Thumbnail provider is not initialized")]
    NotInitialized,

    // ── Decode errors ─────────────────────────────────────────────────────
    /// The decode pipeline failed; the inner error is reported as-is.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    // ── Bitmap errors ─────────────────────────────────────────────────────
    /// The decoded image is not in the canonical 32-bit BGRA layout.
    #[error("Unsupported decoded pixel format {format:?} (expected Bgra8Unorm)")]
    UnsupportedPixelFormat { format: PixelFormat },

    /// Width, height or row pitch is zero or inconsistent with the pixel block.
    #[error("Invalid decoded geometry: {width}x{height}, row pitch {row_pitch}: {detail}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        row_pitch: u32,
        detail: &'static str,
    },

    /// The destination surface could not be allocated.
    #[error("Failed to allocate {bytes} bytes for the bitmap surface")]
    AllocationFailed { bytes: u64 },
}

/// Failures reported by the decode pipeline.
///
/// The pipeline owns this taxonomy. The provider wraps it in
/// [`ThumbError::Decode`] without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No registered decoder recognised the header.
    #[error("Unrecognised image format (first bytes: {magic:02X?})")]
    UnknownFormat { magic: Vec<u8> },

    /// The header was recognised but is internally inconsistent.
    #[error("Corrupt {container} header: {detail}")]
    CorruptHeader {
        container: &'static str,
        detail: String,
    },

    /// The container is valid but its pixel format is not handled.
    #[error("Unsupported {container} pixel format: {detail}")]
    UnsupportedFormat {
        container: &'static str,
        detail: String,
    },

    /// The file is shorter than its header claims.
    #[error("Truncated image data: need {required} bytes, have {actual}")]
    TruncatedData { required: u64, actual: u64 },

    /// The decoded pixel buffer could not be allocated.
    #[error("Failed to allocate {bytes} bytes for decoded pixels")]
    AllocationFailed { bytes: u64 },

    /// The raster (PNG/JPEG/…) codec rejected the data.
    #[error("Raster decode failed: {0}")]
    Raster(String),

    /// The registry has no decoders at all.
    #[error("No decoders are registered")]
    NoDecoders,
}
