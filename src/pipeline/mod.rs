//! Pipeline stages for producing a thumbnail from a source stream.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable, and lets a host swap the decode pipeline
//! without touching ingestion or bitmap handling.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ dispatch ──▶ (DecodePipeline) ──▶ materialize
//! (stream)   (request +      (dds | raster)     (BGRA copy,
//!             512-B prefix)                      stride w*4)
//! ```
//!
//! 1. [`input`] reads the whole stream into memory, bounded by the
//!    configured ceiling; runs once per `initialize`
//! 2. [`dispatch`] builds the decode request and header window and forwards
//!    pipeline errors unchanged
//! 3. [`materialize`] validates the decoded image and copies it row by row into
//!    a tightly packed bitmap

pub mod dispatch;
pub mod input;
pub mod materialize;
