//! Bitmap materialization: copy a decoded BGRA block into a freshly
//! allocated, tightly packed bitmap.
//!
//! The decoder's row pitch may include padding; the output never does.
//! Every check runs before any destination allocation, so a rejected image
//! costs nothing.

use crate::decode::{DecodedImage, PixelFormat};
use crate::error::ThumbError;
use crate::output::{AlphaType, ThumbnailBitmap};
use tracing::debug;

/// Materialize `image` into a [`ThumbnailBitmap`] with stride `width * 4`.
pub fn materialize(image: &DecodedImage) -> Result<ThumbnailBitmap, ThumbError> {
    let pixels = image
        .pixels
        .as_deref()
        .ok_or_else(|| ThumbError::InvalidArgument("decoded image has no pixel block".into()))?;

    if image.format != PixelFormat::Bgra8Unorm {
        return Err(ThumbError::UnsupportedPixelFormat {
            format: image.format,
        });
    }

    let geometry = |detail| ThumbError::InvalidGeometry {
        width: image.width,
        height: image.height,
        row_pitch: image.row_pitch,
        detail,
    };

    if image.width == 0 || image.height == 0 || image.row_pitch == 0 {
        return Err(geometry("zero dimension"));
    }

    let row_bytes = u64::from(image.width) * 4;
    let pitch = u64::from(image.row_pitch);
    if pitch < row_bytes {
        return Err(geometry("row pitch smaller than width * 4"));
    }

    // The last row only needs `row_bytes`, not a full pitch.
    let required = pitch * u64::from(image.height - 1) + row_bytes;
    if (pixels.len() as u64) < required {
        return Err(geometry("pixel block shorter than height rows"));
    }

    let total = row_bytes
        .checked_mul(u64::from(image.height))
        .ok_or(ThumbError::AllocationFailed { bytes: u64::MAX })?;
    let total_len =
        usize::try_from(total).map_err(|_| ThumbError::AllocationFailed { bytes: total })?;

    let mut out = Vec::new();
    out.try_reserve_exact(total_len)
        .map_err(|_| ThumbError::AllocationFailed { bytes: total })?;

    let row_len = row_bytes as usize;
    let pitch_len = pitch as usize;
    for y in 0..image.height as usize {
        let start = y * pitch_len;
        out.extend_from_slice(&pixels[start..start + row_len]);
    }

    debug!(
        "Materialized {}x{} bitmap (source pitch {}, stride {})",
        image.width, image.height, image.row_pitch, row_len
    );
    Ok(ThumbnailBitmap::from_packed(
        image.width,
        image.height,
        out,
        AlphaType::Argb,
    ))
}
