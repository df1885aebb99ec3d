//! The thumbnail bitmap handed back to the host.

use crate::error::ThumbError;
use serde::{Deserialize, Serialize};

/// How the host should treat the fourth channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlphaType {
    /// Alpha semantics are unknown.
    #[default]
    Unknown,
    /// Opaque; the fourth channel is ignored.
    Rgb,
    /// Straight (non-premultiplied) alpha.
    Argb,
}

/// A top-down, 32-bit BGRA bitmap with a tightly packed stride of
/// `width * 4`.
#[derive(Clone, PartialEq, Eq)]
pub struct ThumbnailBitmap {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
    alpha: AlphaType,
}

impl ThumbnailBitmap {
    /// Wrap already packed BGRA pixels. `pixels.len()` must equal
    /// `width * 4 * height`.
    pub(crate) fn from_packed(width: u32, height: u32, pixels: Vec<u8>, alpha: AlphaType) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 4,
            pixels,
            alpha,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row. Always `width * 4`.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn alpha(&self) -> AlphaType {
        self.alpha
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Row `y`, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.pixels.get(start..start + self.stride)
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Convert to an RGBA image for encoding.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage, ThumbError> {
        let mut rgba = self.pixels.clone();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        image::RgbaImage::from_raw(self.width, self.height, rgba).ok_or_else(|| {
            ThumbError::InvalidArgument(format!(
                "pixel buffer of {} bytes does not fit {}x{}",
                self.pixels.len(),
                self.width,
                self.height
            ))
        })
    }
}

impl std::fmt::Debug for ThumbnailBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}
