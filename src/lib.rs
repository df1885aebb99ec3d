//! # dds-thumbnail
//!
//! Produce file-browser thumbnails for DDS textures (and common raster
//! images) from an arbitrary readable stream.
//!
//! ## Why this crate?
//!
//! File browsers call thumbnail providers automatically, on every file a user
//! scrolls past, including crafted or truncated ones. This crate keeps that
//! path small and strict: the source is read once under a hard size ceiling,
//! decoding is delegated to a pluggable pipeline, and the result is copied
//! into a tightly packed BGRA bitmap only after its geometry has been checked.
//!
//! ## Pipeline Overview
//!
//! ```text
//! stream
//!  │
//!  ├─ 1. Ingest       bounded full read (100 MiB ceiling)
//!  ├─ 2. Dispatch     DecodeRequest + 512-byte header prefix
//!  ├─ 3. Decode       DDS (BC1–3, legacy RGB, DX10) or PNG/JPEG/BMP
//!  └─ 4. Materialize  row-by-row copy to BGRA, stride width * 4
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dds_thumbnail::ThumbnailProvider;
//! use std::fs::File;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut provider = ThumbnailProvider::new();
//!     provider.initialize(&mut File::open("texture.dds")?)?;
//!     let bitmap = provider.get_thumbnail(256)?;
//!     eprintln!("{}x{} (stride {})", bitmap.width(), bitmap.height(), bitmap.stride());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ddsthumb` binary (clap + anyhow + tracing-subscriber + tokio) |
//!
//! Disable `cli` when embedding the provider in a host:
//! ```toml
//! dds-thumbnail = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod decode;
pub mod error;
pub mod lifetime;
pub mod output;
pub mod pipeline;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use decode::{
    BuiltinPipeline, DecodeInput, DecodePipeline, DecodeRequest, DecodedImage, Decoder,
    DecoderRegistry, ImagePurpose, PixelFormat,
};
pub use error::{DecodeError, ThumbError};
pub use lifetime::{can_unload, lock_module};
pub use output::{AlphaType, ThumbnailBitmap};
pub use pipeline::input::{SourceBuffer, SourceStream};
pub use provider::{ProviderState, ThumbnailProvider};
