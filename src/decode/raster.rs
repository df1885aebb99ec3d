//! Raster fallback: PNG, JPEG and BMP via the `image` crate.
//!
//! Texture folders routinely hold PNG sources next to their DDS exports, so
//! the registry accepts them too. Output is converted to BGRA and shrunk to
//! the thumbnail target when the source is larger.

use super::{DecodeInput, DecodeRequest, DecodedImage, Decoder};
use crate::error::DecodeError;
use image::{GenericImageView, ImageFormat};
use tracing::debug;

/// Raster formats this build can decode.
fn supported(header: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(header) {
        Ok(fmt @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp)) => Some(fmt),
        _ => None,
    }
}

/// Decoder for common raster formats.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl Decoder for RasterDecoder {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn sniff(&self, header: &[u8]) -> bool {
        supported(header).is_some()
    }

    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError> {
        let format = supported(input.header).ok_or_else(|| DecodeError::UnknownFormat {
            magic: input.header.iter().take(8).copied().collect(),
        })?;

        let mut img = image::load_from_memory_with_format(input.bytes, format)
            .map_err(|e| DecodeError::Raster(e.to_string()))?;

        let (w, h) = img.dimensions();
        if let Some(edge) = request.target_edge() {
            if w.max(h) > edge {
                img = img.thumbnail(edge, edge);
            }
        }

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("{:?} {}x{} -> {}x{} BGRA", format, w, h, width, height);

        let mut pixels = rgba.into_raw();
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Ok(DecodedImage::bgra(width, height, pixels))
    }
}
