//! Decode dispatch: turn a buffered source and a requested size into a
//! [`DecodeRequest`] and hand it to the pipeline.
//!
//! The pipeline's own errors pass through untouched. This stage adds no
//! interpretation of its own beyond the header prefix window.

use crate::config::ProviderConfig;
use crate::decode::{DecodeInput, DecodePipeline, DecodeRequest, DecodedImage, ImagePurpose};
use crate::error::ThumbError;
use crate::pipeline::input::SourceBuffer;
use tracing::debug;

/// Build the request for a square thumbnail of edge `size`.
///
/// Thumbnails are always sRGB and never GPU block-compressed: the consumer is
/// a bitmap renderer, not a texture loader.
pub fn build_request(config: &ProviderConfig, size: u32) -> DecodeRequest {
    DecodeRequest {
        source: config.source_label.clone(),
        purpose: ImagePurpose::Thumbnail,
        target_size: (size, size),
        srgb: true,
        allow_gpu_compressed: false,
    }
}

/// Decode `source` through `pipeline` for a thumbnail of edge `size`.
///
/// An empty buffer is treated as an uninitialized provider.
pub fn decode_source<P>(
    pipeline: &P,
    source: &SourceBuffer,
    size: u32,
    config: &ProviderConfig,
) -> Result<DecodedImage, ThumbError>
where
    P: DecodePipeline + ?Sized,
{
    if source.is_empty() {
        return Err(ThumbError::NotInitialized);
    }

    let request = build_request(config, size);
    let input = DecodeInput::new(source.as_bytes(), config.header_prefix_len);
    debug!(
        "Dispatching {} bytes (header {} bytes) for a {}px thumbnail",
        input.bytes.len(),
        input.header.len(),
        size
    );

    Ok(pipeline.decode(&request, &input)?)
}
