//! DDS container decoding.
//!
//! ## Layout
//!
//! ```text
//! 0    "DDS "                         magic
//! 4    DDS_HEADER        (124 bytes)  size, flags, height, width, mips, pixel format, caps
//! 128  DDS_HEADER_DXT10  (20 bytes)   only when the FourCC is "DX10"
//! 128 | 148                           surface data: face/element 0, mip 0..n, then the next face
//! ```
//!
//! Only the first surface of the first face or array element is decoded. For
//! thumbnails the smallest mip level that still covers the requested size is
//! used, which avoids decompressing a 4K top level just to shrink it.

use super::bc::{self, BlockFormat};
use super::{output_buffer, DecodeInput, DecodeRequest, DecodedImage, Decoder, PixelFormat};
use crate::error::DecodeError;
use serde::Serialize;
use tracing::debug;

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;
const BASE_HEADER_LEN: usize = 128;
const DX10_HEADER_LEN: usize = 20;

/// Largest width or height accepted before any allocation happens.
pub const MAX_DIMENSION: u32 = 16_384;

// DDS_HEADER.dwFlags
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_DEPTH: u32 = 0x80_0000;

// DDS_PIXELFORMAT.dwFlags
const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;

// DDS_HEADER.dwCaps2
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

const DXGI_R8G8B8A8_UNORM: u32 = 28;
const DXGI_R8G8B8A8_UNORM_SRGB: u32 = 29;
const DXGI_BC1_UNORM: u32 = 71;
const DXGI_BC1_UNORM_SRGB: u32 = 72;
const DXGI_BC2_UNORM: u32 = 74;
const DXGI_BC2_UNORM_SRGB: u32 = 75;
const DXGI_BC3_UNORM: u32 = 77;
const DXGI_BC3_UNORM_SRGB: u32 = 78;
const DXGI_B8G8R8A8_UNORM: u32 = 87;
const DXGI_B8G8R8X8_UNORM: u32 = 88;
const DXGI_B8G8R8A8_UNORM_SRGB: u32 = 91;
const DXGI_B8G8R8X8_UNORM_SRGB: u32 = 93;

fn corrupt(detail: impl Into<String>) -> DecodeError {
    DecodeError::CorruptHeader {
        container: "DDS",
        detail: detail.into(),
    }
}

fn unsupported(detail: impl Into<String>) -> DecodeError {
    DecodeError::UnsupportedFormat {
        container: "DDS",
        detail: detail.into(),
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Header facts, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdsInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub array_size: u32,
    pub is_cubemap: bool,
    pub is_volume: bool,
    pub has_dx10_header: bool,
    /// Decodable format, or `None` when the format is recognised but not handled.
    pub format: Option<PixelFormat>,
    /// Human-readable format label, e.g. `"FourCC DXT5"` or `"DXGI 98"`.
    pub format_label: String,
    /// Offset of the first surface byte.
    pub data_offset: usize,
}

/// Parse a DDS header without decoding any pixels.
pub fn inspect(bytes: &[u8]) -> Result<DdsInfo, DecodeError> {
    if bytes.len() < 4 || &bytes[..4] != MAGIC {
        return Err(corrupt("missing 'DDS ' magic"));
    }
    if bytes.len() < BASE_HEADER_LEN {
        return Err(DecodeError::TruncatedData {
            required: BASE_HEADER_LEN as u64,
            actual: bytes.len() as u64,
        });
    }
    if read_u32(bytes, 4) != HEADER_SIZE {
        return Err(corrupt(format!(
            "header size {} (expected {HEADER_SIZE})",
            read_u32(bytes, 4)
        )));
    }
    if read_u32(bytes, 76) != PIXEL_FORMAT_SIZE {
        return Err(corrupt(format!(
            "pixel format size {} (expected {PIXEL_FORMAT_SIZE})",
            read_u32(bytes, 76)
        )));
    }

    let flags = read_u32(bytes, 8);
    let height = read_u32(bytes, 12);
    let width = read_u32(bytes, 16);
    let depth = read_u32(bytes, 24);
    let mip_field = read_u32(bytes, 28);
    let caps2 = read_u32(bytes, 112);

    if width == 0 || height == 0 {
        return Err(corrupt(format!("zero dimension {width}x{height}")));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(corrupt(format!(
            "dimensions {width}x{height} exceed {MAX_DIMENSION}"
        )));
    }

    // A full chain never exceeds floor(log2(max)) + 1 levels.
    let max_levels = 32 - width.max(height).leading_zeros();
    let mip_count = if flags & DDSD_MIPMAPCOUNT != 0 || mip_field > 1 {
        mip_field.clamp(1, max_levels)
    } else {
        1
    };

    let pf_flags = read_u32(bytes, 80);
    let four_cc = &bytes[84..88];

    let mut has_dx10_header = false;
    let mut array_size = 1;
    let mut data_offset = BASE_HEADER_LEN;

    let (format, format_label) = if pf_flags & DDPF_FOURCC != 0 {
        let label = format!("FourCC {}", String::from_utf8_lossy(four_cc));
        match four_cc {
            b"DXT1" => (Some(PixelFormat::Bc1Unorm), label),
            b"DXT3" => (Some(PixelFormat::Bc2Unorm), label),
            b"DXT5" => (Some(PixelFormat::Bc3Unorm), label),
            // Premultiplied alpha; the bitmap contract is straight ARGB.
            b"DXT2" | b"DXT4" => (None, format!("{label} (premultiplied alpha)")),
            b"DX10" => {
                if bytes.len() < BASE_HEADER_LEN + DX10_HEADER_LEN {
                    return Err(DecodeError::TruncatedData {
                        required: (BASE_HEADER_LEN + DX10_HEADER_LEN) as u64,
                        actual: bytes.len() as u64,
                    });
                }
                has_dx10_header = true;
                data_offset += DX10_HEADER_LEN;
                array_size = read_u32(bytes, 140).max(1);
                let dxgi = read_u32(bytes, 128);
                (dxgi_format(dxgi), format!("DXGI {dxgi}"))
            }
            _ => (None, label),
        }
    } else if pf_flags & DDPF_RGB != 0 {
        let bits = read_u32(bytes, 88);
        let masks = [
            read_u32(bytes, 92),
            read_u32(bytes, 96),
            read_u32(bytes, 100),
            read_u32(bytes, 104),
        ];
        let has_alpha = pf_flags & DDPF_ALPHAPIXELS != 0 && masks[3] != 0;
        (
            legacy_rgb_format(bits, masks, has_alpha),
            format!(
                "RGB{bits} {:08X}/{:08X}/{:08X}/{:08X}",
                masks[0], masks[1], masks[2], masks[3]
            ),
        )
    } else {
        (None, format!("pixel format flags {pf_flags:#x}"))
    };

    Ok(DdsInfo {
        width,
        height,
        depth: if flags & DDSD_DEPTH != 0 { depth.max(1) } else { 1 },
        mip_count,
        array_size,
        is_cubemap: caps2 & DDSCAPS2_CUBEMAP != 0,
        is_volume: caps2 & DDSCAPS2_VOLUME != 0,
        has_dx10_header,
        format,
        format_label,
        data_offset,
    })
}

fn dxgi_format(dxgi: u32) -> Option<PixelFormat> {
    match dxgi {
        DXGI_B8G8R8A8_UNORM | DXGI_B8G8R8A8_UNORM_SRGB => Some(PixelFormat::Bgra8Unorm),
        DXGI_B8G8R8X8_UNORM | DXGI_B8G8R8X8_UNORM_SRGB => Some(PixelFormat::Bgrx8Unorm),
        DXGI_R8G8B8A8_UNORM | DXGI_R8G8B8A8_UNORM_SRGB => Some(PixelFormat::Rgba8Unorm),
        DXGI_BC1_UNORM | DXGI_BC1_UNORM_SRGB => Some(PixelFormat::Bc1Unorm),
        DXGI_BC2_UNORM | DXGI_BC2_UNORM_SRGB => Some(PixelFormat::Bc2Unorm),
        DXGI_BC3_UNORM | DXGI_BC3_UNORM_SRGB => Some(PixelFormat::Bc3Unorm),
        _ => None,
    }
}

fn legacy_rgb_format(bits: u32, masks: [u32; 4], has_alpha: bool) -> Option<PixelFormat> {
    const BGR: [u32; 3] = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF];
    const RGB: [u32; 3] = [0x0000_00FF, 0x0000_FF00, 0x00FF_0000];
    let rgb = [masks[0], masks[1], masks[2]];

    match bits {
        32 if rgb == BGR && has_alpha => Some(PixelFormat::Bgra8Unorm),
        32 if rgb == BGR => Some(PixelFormat::Bgrx8Unorm),
        32 if rgb == RGB && has_alpha => Some(PixelFormat::Rgba8Unorm),
        32 if rgb == RGB => Some(PixelFormat::Rgbx8Unorm),
        24 if rgb == BGR => Some(PixelFormat::Bgr8Unorm),
        _ => None,
    }
}

/// Dimensions of mip `level`.
fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Smallest level whose long edge still covers `target`.
fn select_level(info: &DdsInfo, target: Option<u32>) -> u32 {
    let Some(target) = target else { return 0 };
    if info.is_volume {
        return 0;
    }
    let mut level = 0;
    while level + 1 < info.mip_count {
        let (w, h) = level_extent(info.width, info.height, level + 1);
        if w.max(h) < target {
            break;
        }
        level += 1;
    }
    level
}

/// Convert an uncompressed surface to tightly packed BGRA.
fn to_bgra(format: PixelFormat, surface: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // (bytes per texel, red and blue swapped, alpha byte)
    let (unit, swap_rb, alpha) = match format {
        PixelFormat::Bgra8Unorm => (4, false, Some(3)),
        PixelFormat::Bgrx8Unorm => (4, false, None),
        PixelFormat::Rgba8Unorm => (4, true, Some(3)),
        PixelFormat::Rgbx8Unorm => (4, true, None),
        PixelFormat::Bgr8Unorm => (3, false, None),
        PixelFormat::Bc1Unorm | PixelFormat::Bc2Unorm | PixelFormat::Bc3Unorm => {
            return Err(unsupported(format!("{format:?} needs block decompression")));
        }
    };

    let texels = surface.len() / unit;
    let mut out = output_buffer(texels as u64 * 4)?;
    for p in surface.chunks_exact(unit) {
        let (b, r) = if swap_rb { (p[2], p[0]) } else { (p[0], p[2]) };
        out.extend_from_slice(&[b, p[1], r, alpha.map_or(255, |a| p[a])]);
    }
    Ok(out)
}

/// Decoder for `.dds` textures.
#[derive(Debug, Default, Clone, Copy)]
pub struct DdsDecoder;

impl Decoder for DdsDecoder {
    fn name(&self) -> &'static str {
        "dds"
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.starts_with(MAGIC)
    }

    fn decode(
        &self,
        request: &DecodeRequest,
        input: &DecodeInput<'_>,
    ) -> Result<DecodedImage, DecodeError> {
        let bytes = input.bytes;
        let info = inspect(bytes)?;
        let format = info
            .format
            .ok_or_else(|| unsupported(info.format_label.clone()))?;

        let level = select_level(&info, request.target_edge());

        let offset: u64 = (0..level)
            .map(|l| {
                let (w, h) = level_extent(info.width, info.height, l);
                format.surface_size(w, h)
            })
            .sum::<u64>()
            + info.data_offset as u64;
        let (width, height) = level_extent(info.width, info.height, level);
        let size = format.surface_size(width, height);

        let end = offset + size;
        if (bytes.len() as u64) < end {
            return Err(DecodeError::TruncatedData {
                required: end,
                actual: bytes.len() as u64,
            });
        }
        let surface = &bytes[offset as usize..end as usize];

        debug!(
            "DDS {}x{} {} ({} mips) -> level {} at {}x{}, srgb={}",
            info.width,
            info.height,
            info.format_label,
            info.mip_count,
            level,
            width,
            height,
            request.srgb
        );

        let pixels = match BlockFormat::of(format) {
            Some(_) if request.allow_gpu_compressed => {
                return Ok(DecodedImage {
                    width,
                    height,
                    format,
                    row_pitch: format.row_pitch(width) as u32,
                    pixels: Some(surface.to_vec()),
                });
            }
            Some(block) => bc::decompress(block, width, height, surface)?,
            None => to_bgra(format, surface)?,
        };
        Ok(DecodedImage::bgra(width, height, pixels))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{bgra, dx10, legacy};
    use super::*;
    use crate::decode::ImagePurpose;

    fn request(target: u32) -> DecodeRequest {
        DecodeRequest {
            source: "test.dds".into(),
            purpose: ImagePurpose::Thumbnail,
            target_size: (target, target),
            srgb: true,
            allow_gpu_compressed: false,
        }
    }

    fn decode(bytes: &[u8], target: u32) -> Result<DecodedImage, DecodeError> {
        DdsDecoder.decode(&request(target), &DecodeInput::new(bytes, 512))
    }

    #[test]
    fn sniffs_magic_only() {
        assert!(DdsDecoder.sniff(b"DDS \x7c\0\0\0"));
        assert!(!DdsDecoder.sniff(b"\x89PNG"));
        assert!(!DdsDecoder.sniff(b"DD"));
    }

    #[test]
    fn decodes_bgra_passthrough() {
        let payload: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        let file = bgra(2, 2, 1, &payload);
        let img = decode(&file, 256).unwrap();
        assert_eq!((img.width, img.height), (2, 2));
        assert_eq!(img.format, PixelFormat::Bgra8Unorm);
        assert_eq!(img.row_pitch, 8);
        assert_eq!(img.pixels.unwrap(), payload);
    }

    #[test]
    fn swizzles_rgba_to_bgra() {
        let file = legacy(
            1,
            1,
            1,
            0x41,
            &[0; 4],
            32,
            [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000],
            &[10, 20, 30, 40],
        );
        let img = decode(&file, 64).unwrap();
        assert_eq!(img.pixels.unwrap(), vec![30, 20, 10, 40]);
    }

    #[test]
    fn expands_bgr24() {
        let file = legacy(
            2,
            1,
            1,
            0x40,
            &[0; 4],
            24,
            [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0],
            &[1, 2, 3, 4, 5, 6],
        );
        let img = decode(&file, 64).unwrap();
        assert_eq!(img.pixels.unwrap(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn decompresses_dxt1() {
        let red: u16 = 0xF800;
        let [lo, hi] = red.to_le_bytes();
        let file = legacy(4, 4, 1, 0x4, b"DXT1", 0, [0; 4], &[lo, hi, lo, hi, 0, 0, 0, 0]);
        let img = decode(&file, 64).unwrap();
        assert_eq!(img.format, PixelFormat::Bgra8Unorm);
        let pixels = img.pixels.unwrap();
        assert_eq!(pixels.len(), 64);
        assert_eq!(&pixels[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn returns_blocks_when_gpu_compressed_allowed() {
        let file = legacy(4, 4, 1, 0x4, b"DXT5", 0, [0; 4], &[0u8; 16]);
        let mut req = request(64);
        req.allow_gpu_compressed = true;
        let img = DdsDecoder
            .decode(&req, &DecodeInput::new(&file, 512))
            .unwrap();
        assert_eq!(img.format, PixelFormat::Bc3Unorm);
        assert_eq!(img.row_pitch, 16);
    }

    #[test]
    fn truncated_surface_is_reported() {
        let file = bgra(4, 4, 1, &[0u8; 10]);
        match decode(&file, 64).unwrap_err() {
            DecodeError::TruncatedData { required, actual } => {
                assert_eq!(required, 128 + 64);
                assert_eq!(actual, 138);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_header_size_is_corrupt() {
        let mut file = bgra(1, 1, 1, &[0; 4]);
        file[4] = 0;
        assert!(matches!(
            decode(&file, 64).unwrap_err(),
            DecodeError::CorruptHeader { .. }
        ));
    }

    #[test]
    fn oversized_dimensions_rejected_before_allocation() {
        let file = bgra(MAX_DIMENSION + 1, 1, 1, &[]);
        assert!(matches!(
            decode(&file, 64).unwrap_err(),
            DecodeError::CorruptHeader { .. }
        ));
    }

    #[test]
    fn unknown_four_cc_is_unsupported() {
        let file = legacy(4, 4, 1, 0x4, b"ATI2", 0, [0; 4], &[0u8; 16]);
        match decode(&file, 64).unwrap_err() {
            DecodeError::UnsupportedFormat { detail, .. } => assert!(detail.contains("ATI2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn picks_smallest_covering_mip() {
        // 8x8 -> 4x4 -> 2x2 -> 1x1, each level filled with its index.
        let mut payload = Vec::new();
        for (level, edge) in [8usize, 4, 2, 1].into_iter().enumerate() {
            payload.extend(std::iter::repeat(level as u8).take(edge * edge * 4));
        }
        let file = bgra(8, 8, 4, &payload);

        let img = decode(&file, 4).unwrap();
        assert_eq!((img.width, img.height), (4, 4));
        assert!(img.pixels.unwrap().iter().all(|&b| b == 1));

        let img = decode(&file, 3).unwrap();
        assert_eq!((img.width, img.height), (4, 4));

        let img = decode(&file, 256).unwrap();
        assert_eq!((img.width, img.height), (8, 8));
    }

    #[test]
    fn inspect_reports_dx10_header() {
        let file = dx10(4, 4, DXGI_B8G8R8A8_UNORM_SRGB, 2, &[]);
        let info = inspect(&file).unwrap();
        assert!(info.has_dx10_header);
        assert_eq!(info.format, Some(PixelFormat::Bgra8Unorm));
        assert_eq!(info.array_size, 2);
        assert_eq!(info.data_offset, 148);
        assert_eq!(info.format_label, "DXGI 91");
    }

    #[test]
    fn decodes_dx10_rgba() {
        let file = dx10(2, 1, DXGI_R8G8B8A8_UNORM, 1, &[0, 1, 2, 3, 4, 5, 6, 7]);
        let img = decode(&file, 64).unwrap();
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.pixels.unwrap(), vec![2, 1, 0, 3, 6, 5, 4, 7]);
    }

    #[test]
    fn fills_alpha_for_bgrx() {
        let file = legacy(
            1,
            1,
            1,
            0x40,
            &[0; 4],
            32,
            [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0],
            &[1, 2, 3, 99],
        );
        assert_eq!(inspect(&file).unwrap().format, Some(PixelFormat::Bgrx8Unorm));
        assert_eq!(decode(&file, 64).unwrap().pixels.unwrap(), vec![1, 2, 3, 255]);
    }

    #[test]
    fn swizzles_rgbx_and_fills_alpha() {
        let file = legacy(
            1,
            1,
            1,
            0x40,
            &[0; 4],
            32,
            [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0],
            &[1, 2, 3, 99],
        );
        assert_eq!(inspect(&file).unwrap().format, Some(PixelFormat::Rgbx8Unorm));
        assert_eq!(decode(&file, 64).unwrap().pixels.unwrap(), vec![3, 2, 1, 255]);
    }

    #[test]
    fn decompresses_dxt3_and_dxt5() {
        let red: u16 = 0xF800;
        let [lo, hi] = red.to_le_bytes();
        let color = [lo, hi, lo, hi, 0, 0, 0, 0];

        // Explicit 4-bit alpha 0x8 everywhere -> 136.
        let mut block = [0x88u8; 16];
        block[8..].copy_from_slice(&color);
        let file = legacy(4, 4, 1, 0x4, b"DXT3", 0, [0; 4], &block);
        let pixels = decode(&file, 64).unwrap().pixels.unwrap();
        assert!(pixels.chunks_exact(4).all(|px| px == [0, 0, 255, 136]));

        // Equal alpha endpoints, every index 0 -> 200.
        let mut block = [0u8; 16];
        block[..2].copy_from_slice(&[200, 200]);
        block[8..].copy_from_slice(&color);
        let file = legacy(4, 4, 1, 0x4, b"DXT5", 0, [0; 4], &block);
        let pixels = decode(&file, 64).unwrap().pixels.unwrap();
        assert!(pixels.chunks_exact(4).all(|px| px == [0, 0, 255, 200]));
    }

    #[test]
    fn premultiplied_four_cc_is_unsupported() {
        for four_cc in [b"DXT2", b"DXT4"] {
            let file = legacy(4, 4, 1, 0x4, four_cc, 0, [0; 4], &[0u8; 16]);
            assert_eq!(inspect(&file).unwrap().format, None);
            match decode(&file, 64).unwrap_err() {
                DecodeError::UnsupportedFormat { detail, .. } => {
                    assert!(detail.contains("premultiplied"), "got: {detail}")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn block_formats_are_not_swizzled() {
        assert!(matches!(
            to_bgra(PixelFormat::Bc1Unorm, &[0u8; 8]).unwrap_err(),
            DecodeError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn cubemap_uses_first_face() {
        // Two of six 1x1 faces present; face i is filled with i + 1.
        let mut file = bgra(1, 1, 1, &[1, 1, 1, 1, 2, 2, 2, 2]);
        file[112..116].copy_from_slice(&(DDSCAPS2_CUBEMAP | 0xFC00).to_le_bytes());
        assert!(inspect(&file).unwrap().is_cubemap);
        assert_eq!(decode(&file, 64).unwrap().pixels.unwrap(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn array_uses_first_element() {
        let file = dx10(1, 1, DXGI_B8G8R8A8_UNORM, 2, &[9, 9, 9, 9, 7, 7, 7, 7]);
        assert_eq!(inspect(&file).unwrap().array_size, 2);
        assert_eq!(decode(&file, 64).unwrap().pixels.unwrap(), vec![9, 9, 9, 9]);
    }
}
