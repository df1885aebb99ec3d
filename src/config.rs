//! Configuration for the thumbnail provider.
//!
//! All provider behaviour is controlled through [`ProviderConfig`], built via
//! its [`ProviderConfigBuilder`]. The defaults reproduce the behaviour a shell
//! host expects, so most callers never touch the builder.

use crate::error::ThumbError;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the size of an ingested source: 100 MiB.
///
/// The whole asset is buffered before its format is known, and the provider
/// is invoked automatically on arbitrary files, so the read must be bounded.
pub const MAX_SOURCE_BYTES: u64 = 100 * 1024 * 1024;

/// Number of leading bytes handed to the pipeline for format sniffing.
pub const HEADER_PREFIX_LEN: usize = 512;

/// Largest header prefix the builder accepts.
const MAX_HEADER_PREFIX_LEN: usize = 4096;

/// Label passed to the decode pipeline as the request source.
pub const DEFAULT_SOURCE_LABEL: &str = "thumbnail.dds";

/// Configuration for a [`crate::ThumbnailProvider`].
///
/// # Example
/// ```rust
/// use dds_thumbnail::ProviderConfig;
///
/// let config = ProviderConfig::builder()
///     .max_source_bytes(16 * 1024 * 1024)
///     .source_label("icon.dds")
///     .build()
///     .unwrap();
/// assert_eq!(config.header_prefix_len, 512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Largest stream `initialize` will buffer. Range: 1–[`MAX_SOURCE_BYTES`]. Default: 100 MiB.
    pub max_source_bytes: u64,

    /// Length of the header prefix given to the pipeline. Range: 1–4096. Default: 512.
    pub header_prefix_len: usize,

    /// Source label carried in every decode request. Default: `"thumbnail.dds"`.
    pub source_label: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: MAX_SOURCE_BYTES,
            header_prefix_len: HEADER_PREFIX_LEN,
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Create a new builder for `ProviderConfig`.
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn max_source_bytes(mut self, bytes: u64) -> Self {
        self.config.max_source_bytes = bytes;
        self
    }

    pub fn header_prefix_len(mut self, len: usize) -> Self {
        self.config.header_prefix_len = len;
        self
    }

    pub fn source_label(mut self, label: impl Into<String>) -> Self {
        self.config.source_label = label.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProviderConfig, ThumbError> {
        let c = &self.config;
        if c.max_source_bytes == 0 || c.max_source_bytes > MAX_SOURCE_BYTES {
            return Err(ThumbError::InvalidConfig(format!(
                "max_source_bytes must be 1–{}, got {}",
                MAX_SOURCE_BYTES, c.max_source_bytes
            )));
        }
        if c.header_prefix_len == 0 || c.header_prefix_len > MAX_HEADER_PREFIX_LEN {
            return Err(ThumbError::InvalidConfig(format!(
                "header_prefix_len must be 1–{}, got {}",
                MAX_HEADER_PREFIX_LEN, c.header_prefix_len
            )));
        }
        if c.source_label.is_empty() {
            return Err(ThumbError::InvalidConfig(
                "source_label must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
