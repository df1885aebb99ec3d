//! The decode pipeline: format sniffing, codec selection, pixel output.
//!
//! The provider only depends on the [`DecodePipeline`] trait. Everything else
//! in this module is the built-in implementation of that trait, a registry of
//! [`Decoder`]s that each claim a header and produce a [`DecodedImage`].
//!
//! ## Data Flow
//!
//! ```text
//! DecodeInput ──▶ sniff(header) ──▶ Decoder::decode ──▶ DecodedImage
//!  (bytes, prefix)   (registry order)   (dds | raster)    (BGRA, pitch)
//! ```
//!
//! Built-in decoders are registered once per process, lazily, the first time
//! [`builtin_registry`] is touched.

pub mod bc;
pub mod dds;
pub mod raster;

use crate::error::DecodeError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Request / input ──────────────────────────────────────────────────────

/// Why the caller wants the image. Decoders may pick cheaper paths for
/// small outputs, such as a smaller mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImagePurpose {
    /// Small preview bitmap for a file browser.
    #[default]
    Thumbnail,
}

/// What the caller wants decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Label for diagnostics, usually a file name.
    pub source: String,
    pub purpose: ImagePurpose,
    /// Requested output size `(width, height)`. A hint, not a guarantee.
    pub target_size: (u32, u32),
    /// Output should be sRGB-encoded.
    pub srgb: bool,
    /// Block-compressed surfaces may be returned undecoded.
    pub allow_gpu_compressed: bool,
}

impl DecodeRequest {
    /// Longest edge of the requested target, or `None` when no size was given.
    pub fn target_edge(&self) -> Option<u32> {
        let edge = self.target_size.0.max(self.target_size.1);
        (edge > 0).then_some(edge)
    }
}

/// Borrowed view over a fully buffered source.
#[derive(Debug, Clone, Copy)]
pub struct DecodeInput<'a> {
    /// Every byte of the source.
    pub bytes: &'a [u8],
    /// The leading bytes used for sniffing.
    pub header: &'a [u8],
}

impl<'a> DecodeInput<'a> {
    /// Build a view whose header is the first `prefix_len` bytes, or the whole
    /// buffer if it is shorter.
    pub fn new(bytes: &'a [u8], prefix_len: usize) -> Self {
        let header = &bytes[..bytes.len().min(prefix_len)];
        Self { bytes, header }
    }
}

// ── Output ───────────────────────────────────────────────────────────────

/// Pixel layouts a decoder may declare.
///
/// Only [`PixelFormat::Bgra8Unorm`] is accepted by the bitmap materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A. The canonical thumbnail layout.
    Bgra8Unorm,
    /// 8-bit B, G, R, unused.
    Bgrx8Unorm,
    /// 8-bit R, G, B, A.
    Rgba8Unorm,
    /// 8-bit R, G, B, unused.
    Rgbx8Unorm,
    /// 24-bit B, G, R.
    Bgr8Unorm,
    /// BC1 / DXT1, 8 bytes per 4x4 block.
    Bc1Unorm,
    /// BC2 / DXT3, 16 bytes per 4x4 block.
    Bc2Unorm,
    /// BC3 / DXT5, 16 bytes per 4x4 block.
    Bc3Unorm,
}

impl PixelFormat {
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::Bc1Unorm | PixelFormat::Bc2Unorm | PixelFormat::Bc3Unorm
        )
    }

    /// Bytes per pixel, or per 4x4 block for compressed formats.
    pub fn unit_bytes(self) -> u64 {
        match self {
            PixelFormat::Bgra8Unorm
            | PixelFormat::Bgrx8Unorm
            | PixelFormat::Rgba8Unorm
            | PixelFormat::Rgbx8Unorm => 4,
            PixelFormat::Bgr8Unorm => 3,
            PixelFormat::Bc1Unorm => 8,
            PixelFormat::Bc2Unorm | PixelFormat::Bc3Unorm => 16,
        }
    }

    /// Tightly packed row pitch for a surface of the given width.
    pub fn row_pitch(self, width: u32) -> u64 {
        if self.is_block_compressed() {
            blocks(width) * self.unit_bytes()
        } else {
            u64::from(width) * self.unit_bytes()
        }
    }

    /// Byte size of one surface of the given dimensions.
    pub fn surface_size(self, width: u32, height: u32) -> u64 {
        if self.is_block_compressed() {
            self.row_pitch(width) * blocks(height)
        } else {
            self.row_pitch(width) * u64::from(height)
        }
    }
}

fn blocks(extent: u32) -> u64 {
    u64::from(extent.max(1)).div_ceil(4)
}

/// An empty buffer with room for `len` decoded bytes, or `AllocationFailed`
/// when the reservation cannot be made.
pub(crate) fn output_buffer(len: u64) -> Result<Vec<u8>, DecodeError> {
    let failed = DecodeError::AllocationFailed { bytes: len };
    let len = usize::try_from(len).map_err(|_| failed.clone())?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| failed)?;
    Ok(buf)
}

/// A decoded surface as handed back by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes between the starts of consecutive rows (may include padding).
    pub row_pitch: u32,
    /// Pixel data, or `None` when the decoder produced no block.
    pub pixels: Option<Vec<u8>>,
}

impl DecodedImage {
    /// A tightly packed BGRA image.
    pub fn bgra(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Bgra8Unorm,
            row_pitch: width.saturating_mul(4),
            pixels: Some(pixels),
        }
    }
}

// ── Traits ───────────────────────────────────────────────────────────────

/// The single capability the provider needs from a decode pipeline.
pub trait DecodePipeline {
    /// Decode `input` according to `request`.
    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError>;
}

impl<P: DecodePipeline + ?Sized> DecodePipeline for &P {
    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError> {
        (**self).decode(request, input)
    }
}

/// One codec in the registry.
pub trait Decoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this decoder recognises the header prefix.
    fn sniff(&self, header: &[u8]) -> bool;

    /// Decode a source this decoder has claimed.
    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError>;
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Ordered set of decoders; the first one whose `sniff` accepts the header
/// wins.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in decoders: DDS first, then raster.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(dds::DdsDecoder));
        registry.register(Box::new(raster::RasterDecoder));
        registry
    }

    pub fn register(&mut self, decoder: Box<dyn Decoder>) {
        debug!("Registering decoder '{}'", decoder.name());
        self.decoders.push(decoder);
    }

    /// Names of the registered decoders, in sniffing order.
    pub fn names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    fn find(&self, header: &[u8]) -> Option<&dyn Decoder> {
        self.decoders
            .iter()
            .find(|d| d.sniff(header))
            .map(|d| d.as_ref())
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.names())
            .finish()
    }
}

impl DecodePipeline for DecoderRegistry {
    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError> {
        if self.decoders.is_empty() {
            return Err(DecodeError::NoDecoders);
        }

        let decoder = self
            .find(input.header)
            .ok_or_else(|| DecodeError::UnknownFormat {
                magic: input.header.iter().take(8).copied().collect(),
            })?;

        debug!(
            "Decoding '{}' ({} bytes) with {} decoder",
            request.source,
            input.bytes.len(),
            decoder.name()
        );
        decoder.decode(request, input)
    }
}

static BUILTIN_REGISTRY: Lazy<DecoderRegistry> = Lazy::new(|| {
    debug!("Initialising built-in decoder registry");
    DecoderRegistry::with_builtins()
});

/// The process-wide registry of built-in decoders, created on first use.
pub fn builtin_registry() -> &'static DecoderRegistry {
    &BUILTIN_REGISTRY
}

/// The default pipeline: dispatches over [`builtin_registry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPipeline;

impl DecodePipeline for BuiltinPipeline {
    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError> {
        builtin_registry().decode(request, input)
    }
}
