//! BC1–BC3 (DXT1, DXT3, DXT5) block decompression to BGRA.
//!
//! Each 4x4 block stores two RGB565 endpoints and 2-bit palette indices;
//! BC2 adds explicit 4-bit alpha, BC3 adds an interpolated alpha block.

use super::{output_buffer, PixelFormat};
use crate::error::DecodeError;

/// The block encodings this module can expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    Bc1,
    Bc2,
    Bc3,
}

impl BlockFormat {
    /// The block encoding behind `format`, or `None` for uncompressed formats.
    pub fn of(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Bc1Unorm => Some(BlockFormat::Bc1),
            PixelFormat::Bc2Unorm => Some(BlockFormat::Bc2),
            PixelFormat::Bc3Unorm => Some(BlockFormat::Bc3),
            _ => None,
        }
    }

    fn block_bytes(self) -> usize {
        match self {
            BlockFormat::Bc1 => 8,
            BlockFormat::Bc2 | BlockFormat::Bc3 => 16,
        }
    }
}

/// Decompress a block-compressed surface into tightly packed BGRA.
///
/// `data` should hold every block of the surface; missing trailing blocks are
/// left transparent black.
pub fn decompress(
    format: BlockFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let w = width as usize;
    let h = height as usize;
    let len = u64::from(width) * u64::from(height) * 4;
    let mut out = output_buffer(len)?;
    out.resize(w * h * 4, 0);

    let blocks_wide = w.div_ceil(4).max(1);
    let blocks_high = h.div_ceil(4).max(1);

    for (i, block) in data
        .chunks_exact(format.block_bytes())
        .take(blocks_wide * blocks_high)
        .enumerate()
    {
        let texels = match format {
            BlockFormat::Bc1 => decode_bc1(block),
            BlockFormat::Bc2 => decode_bc2(block),
            BlockFormat::Bc3 => decode_bc3(block),
        };

        let bx = (i % blocks_wide) * 4;
        let by = (i / blocks_wide) * 4;
        for (t, texel) in texels.iter().enumerate() {
            let x = bx + t % 4;
            let y = by + t / 4;
            if x < w && y < h {
                let o = (y * w + x) * 4;
                out[o..o + 4].copy_from_slice(texel);
            }
        }
    }

    Ok(out)
}

/// Expand RGB565 to 8-bit `[b, g, r]`.
fn rgb565(c: u16) -> [u8; 3] {
    let r = ((c >> 11) & 0x1F) as u8;
    let g = ((c >> 5) & 0x3F) as u8;
    let b = (c & 0x1F) as u8;
    [(b << 3) | (b >> 2), (g << 2) | (g >> 4), (r << 3) | (r >> 2)]
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16) -> [u8; 3] {
    let d = wa + wb;
    [
        ((u16::from(a[0]) * wa + u16::from(b[0]) * wb) / d) as u8,
        ((u16::from(a[1]) * wa + u16::from(b[1]) * wb) / d) as u8,
        ((u16::from(a[2]) * wa + u16::from(b[2]) * wb) / d) as u8,
    ]
}

/// Decode the 8-byte colour part. `punch_through` enables the BC1 3-colour
/// mode with a transparent fourth entry.
fn decode_color(block: &[u8], punch_through: bool) -> [[u8; 4]; 16] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let e0 = rgb565(c0);
    let e1 = rgb565(c1);
    let opaque = |c: [u8; 3]| [c[0], c[1], c[2], 255];

    let palette = if c0 > c1 || !punch_through {
        [
            opaque(e0),
            opaque(e1),
            opaque(mix(e0, e1, 2, 1)),
            opaque(mix(e0, e1, 1, 2)),
        ]
    } else {
        [opaque(e0), opaque(e1), opaque(mix(e0, e1, 1, 1)), [0, 0, 0, 0]]
    };

    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[((indices >> (2 * i)) & 0b11) as usize];
    }
    texels
}

fn decode_bc1(block: &[u8]) -> [[u8; 4]; 16] {
    decode_color(block, true)
}

fn decode_bc2(block: &[u8]) -> [[u8; 4]; 16] {
    let alpha = u64::from_le_bytes([
        block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
    ]);
    let mut texels = decode_color(&block[8..16], false);
    for (i, texel) in texels.iter_mut().enumerate() {
        texel[3] = ((alpha >> (4 * i)) & 0xF) as u8 * 17;
    }
    texels
}

fn decode_bc3(block: &[u8]) -> [[u8; 4]; 16] {
    let a0 = u16::from(block[0]);
    let a1 = u16::from(block[1]);
    let mut alphas = [0u8; 8];
    alphas[0] = a0 as u8;
    alphas[1] = a1 as u8;
    if a0 > a1 {
        for i in 1..7u16 {
            alphas[i as usize + 1] = (((7 - i) * a0 + i * a1) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            alphas[i as usize + 1] = (((5 - i) * a0 + i * a1) / 5) as u8;
        }
        alphas[6] = 0;
        alphas[7] = 255;
    }

    let bits = u64::from_le_bytes([
        block[2], block[3], block[4], block[5], block[6], block[7], 0, 0,
    ]);
    let mut texels = decode_color(&block[8..16], false);
    for (i, texel) in texels.iter_mut().enumerate() {
        texel[3] = alphas[((bits >> (3 * i)) & 0b111) as usize];
    }
    texels
}
