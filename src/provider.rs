//! The thumbnail provider: a two-call protocol over the pipeline stages.
//!
//! ```text
//!              initialize(ok)
//! Uninitialized ────────────▶ Ready ──┐ get_thumbnail(size)
//!       ▲                       │  ◀──┘ (any number of times)
//!       └──── initialize(err) ──┘
//! ```
//!
//! A failed `initialize` always leaves the provider `Uninitialized`, so a
//! later `get_thumbnail` can never observe stale or partial data. The host
//! serialises calls on one instance; no internal locking is needed.

use crate::config::ProviderConfig;
use crate::decode::{BuiltinPipeline, DecodePipeline};
use crate::error::ThumbError;
use crate::lifetime::InstanceGuard;
use crate::output::ThumbnailBitmap;
use crate::pipeline::dispatch::decode_source;
use crate::pipeline::input::{ingest, SourceBuffer, SourceStream};
use crate::pipeline::materialize::materialize;
use tracing::{debug, warn};

/// Protocol state of one provider instance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ProviderState {
    /// No source ingested, or the last ingestion failed.
    #[default]
    Uninitialized,
    /// A source is buffered and thumbnails may be requested.
    Ready(SourceBuffer),
}

/// Produces thumbnails for one source at a time.
///
/// Generic over the decode pipeline so hosts and tests can supply their own;
/// the default dispatches over the built-in DDS and raster decoders.
#[derive(Debug)]
pub struct ThumbnailProvider<P = BuiltinPipeline> {
    config: ProviderConfig,
    pipeline: P,
    state: ProviderState,
    _instance: InstanceGuard,
}

impl ThumbnailProvider<BuiltinPipeline> {
    /// A provider with default configuration and the built-in pipeline.
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self::with_pipeline(config, BuiltinPipeline)
    }
}

impl Default for ThumbnailProvider<BuiltinPipeline> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DecodePipeline> ThumbnailProvider<P> {
    pub fn with_pipeline(config: ProviderConfig, pipeline: P) -> Self {
        Self {
            config,
            pipeline,
            state: ProviderState::Uninitialized,
            _instance: InstanceGuard::acquire(),
        }
    }

    /// Buffer `stream` as the source for subsequent thumbnails.
    ///
    /// Replaces any previously ingested source. On failure the provider is
    /// left `Uninitialized`.
    pub fn initialize<S>(&mut self, stream: &mut S) -> Result<(), ThumbError>
    where
        S: SourceStream + ?Sized,
    {
        self.state = ProviderState::Uninitialized;

        match ingest(stream, self.config.max_source_bytes) {
            Ok(buffer) => {
                debug!("Provider ready ({} bytes)", buffer.len());
                self.state = ProviderState::Ready(buffer);
                Ok(())
            }
            Err(e) => {
                warn!("Initialize failed: {}", e);
                Err(e)
            }
        }
    }

    /// Decode the ingested source and materialize a bitmap. `size` is the
    /// requested square edge; the pipeline treats it as a hint, so the result
    /// carries the decoded image's own dimensions.
    pub fn get_thumbnail(&self, size: u32) -> Result<ThumbnailBitmap, ThumbError> {
        let ProviderState::Ready(source) = &self.state else {
            return Err(ThumbError::NotInitialized);
        };

        let decoded = decode_source(&self.pipeline, source, size, &self.config)?;
        materialize(&decoded)
    }

    pub fn state(&self) -> &ProviderState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ProviderState::Ready(_))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::dds::fixtures::bgra;
    use crate::decode::{DecodeInput, DecodeRequest, DecodedImage, PixelFormat};
    use crate::error::DecodeError;
    use crate::pipeline::input::fixtures::LyingStream;
    use std::cell::Cell;
    use std::io::Cursor;

    /// Returns a fixed image and counts calls.
    struct CountingPipeline {
        calls: Cell<u32>,
        image: DecodedImage,
    }

    impl CountingPipeline {
        fn new(image: DecodedImage) -> Self {
            Self {
                calls: Cell::new(0),
                image,
            }
        }
    }

    impl DecodePipeline for CountingPipeline {
        fn decode(
            &self,
            _request: &DecodeRequest,
            _input: &DecodeInput<'_>,
        ) -> Result<DecodedImage, DecodeError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.image.clone())
        }
    }

    fn small_config(limit: u64) -> ProviderConfig {
        ProviderConfig::builder()
            .max_source_bytes(limit)
            .build()
            .unwrap()
    }

    fn pixels(width: u32, height: u32, seed: u8) -> Vec<u8> {
        (0..width * height * 4)
            .map(|i| (i as u8).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn starts_uninitialized() {
        let provider = ThumbnailProvider::new();
        assert_eq!(provider.state(), &ProviderState::Uninitialized);
        assert!(!provider.is_ready());
    }

    #[test]
    fn thumbnail_before_initialize_never_decodes() {
        let pipeline = CountingPipeline::new(DecodedImage::bgra(1, 1, vec![0; 4]));
        let provider = ThumbnailProvider::with_pipeline(ProviderConfig::default(), &pipeline);
        assert!(matches!(
            provider.get_thumbnail(64),
            Err(ThumbError::NotInitialized)
        ));
        assert_eq!(pipeline.calls.get(), 0);
    }

    #[test]
    fn decodes_dds_at_natural_size() {
        let payload = pixels(5, 3, 0);
        let mut provider = ThumbnailProvider::new();
        provider
            .initialize(&mut Cursor::new(bgra(5, 3, 1, &payload)))
            .unwrap();
        assert!(provider.is_ready());

        let bmp = provider.get_thumbnail(256).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (5, 3));
        assert_eq!(bmp.stride(), 20);
        assert_eq!(bmp.pixels(), payload.as_slice());
    }

    #[test]
    fn get_thumbnail_is_idempotent() {
        let mut provider = ThumbnailProvider::new();
        provider
            .initialize(&mut Cursor::new(bgra(4, 4, 1, &pixels(4, 4, 7))))
            .unwrap();
        let a = provider.get_thumbnail(32).unwrap();
        let b = provider.get_thumbnail(32).unwrap();
        assert_eq!(a, b);
        assert!(provider.is_ready());
    }

    #[test]
    fn reinitialize_replaces_source() {
        let mut provider = ThumbnailProvider::new();
        provider
            .initialize(&mut Cursor::new(bgra(2, 2, 1, &pixels(2, 2, 0))))
            .unwrap();
        let second = pixels(3, 1, 99);
        provider
            .initialize(&mut Cursor::new(bgra(3, 1, 1, &second)))
            .unwrap();

        let bmp = provider.get_thumbnail(64).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (3, 1));
        assert_eq!(bmp.pixels(), second.as_slice());
    }

    #[test]
    fn empty_and_oversized_streams_leave_uninitialized() {
        let mut provider = ThumbnailProvider::with_config(small_config(64));

        let err = provider.initialize(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ThumbError::EmptySource));
        assert!(!provider.is_ready());

        let err = provider
            .initialize(&mut Cursor::new(vec![0u8; 65]))
            .unwrap_err();
        assert!(matches!(err, ThumbError::SourceTooLarge { .. }));
        assert!(!provider.is_ready());
    }

    #[test]
    fn short_read_clears_previous_source() {
        let mut provider = ThumbnailProvider::new();
        provider
            .initialize(&mut Cursor::new(bgra(2, 2, 1, &pixels(2, 2, 0))))
            .unwrap();

        let mut stream = LyingStream::new(vec![1, 2, 3], 100);
        let err = provider.initialize(&mut stream).unwrap_err();
        assert!(matches!(
            err,
            ThumbError::ShortRead {
                expected: 100,
                actual: 3
            }
        ));
        assert_eq!(provider.state(), &ProviderState::Uninitialized);
        assert!(matches!(
            provider.get_thumbnail(64),
            Err(ThumbError::NotInitialized)
        ));
    }

    #[test]
    fn non_bgra_output_is_rejected() {
        let pipeline = CountingPipeline::new(DecodedImage {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8Unorm,
            row_pitch: 8,
            pixels: Some(vec![0; 16]),
        });
        let mut provider =
            ThumbnailProvider::with_pipeline(ProviderConfig::default(), &pipeline);
        provider.initialize(&mut Cursor::new(vec![1u8; 4])).unwrap();
        assert!(matches!(
            provider.get_thumbnail(64),
            Err(ThumbError::UnsupportedPixelFormat {
                format: PixelFormat::Rgba8Unorm
            })
        ));
        assert_eq!(pipeline.calls.get(), 1);
    }

    #[test]
    fn padded_rows_are_stripped() {
        let width = 3;
        let height = 4;
        let pitch = width * 4 + 16;
        let mut block = vec![0xAAu8; (pitch * height) as usize];
        for y in 0..height {
            let start = (y * pitch) as usize;
            block[start..start + (width * 4) as usize].fill(y as u8 + 1);
        }
        let pipeline = CountingPipeline::new(DecodedImage {
            width,
            height,
            format: PixelFormat::Bgra8Unorm,
            row_pitch: pitch,
            pixels: Some(block),
        });
        let mut provider =
            ThumbnailProvider::with_pipeline(ProviderConfig::default(), &pipeline);
        provider.initialize(&mut Cursor::new(vec![1u8; 4])).unwrap();

        let bmp = provider.get_thumbnail(64).unwrap();
        for y in 0..height {
            assert!(bmp.row(y).unwrap().iter().all(|&b| b == y as u8 + 1));
        }
    }

    #[test]
    fn decode_errors_surface_unchanged() {
        let mut provider = ThumbnailProvider::new();
        provider
            .initialize(&mut Cursor::new(b"not an image at all".to_vec()))
            .unwrap();
        assert!(matches!(
            provider.get_thumbnail(64),
            Err(ThumbError::Decode(DecodeError::UnknownFormat { .. }))
        ));
        // Decode failures do not change protocol state.
        assert!(provider.is_ready());
    }
}
