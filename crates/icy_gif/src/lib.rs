//! # icy_gif
//!
//! A 100% Rust animated GIF encoder built for small output sizes.
//!
//! ## Features
//!
//! - **Quantizer**: median-cut palette generation over a 15-bit color histogram,
//!   optional Floyd-Steinberg dithering and an alpha threshold for transparency
//! - **Encoder**: GIF89a container writer with local color tables, looping and
//!   a variable-width LZW compressor
//! - **Pipeline**: feeds a stream of RGBA frames through both and reports the
//!   result against a byte budget
//!
//! ## Quick Start
//!
//! ### Quantizing and encoding a single frame
//!
//! ```ignore
//! use icy_gif::{quantize, EncoderOptions, Frame, GifEncoder, QuantizeOptions};
//!
//! // RGBA image data (4 bytes per pixel)
//! let rgba = vec![255u8, 0, 0, 255, 0, 255, 0, 255]; // red and green pixels
//! let q = quantize(&rgba, 2, 1, &QuantizeOptions::default())?;
//!
//! let mut encoder = GifEncoder::new(2, 1, &EncoderOptions::default())?;
//! encoder.add_frame(&Frame {
//!     indices: &q.indices,
//!     palette: &q.flat_palette(),
//!     delay_ms: 100,
//!     transparent_index: q.transparent_index,
//! })?;
//! let bytes = encoder.finish();
//! ```
//!
//! ### Building an animation from a frame source
//!
//! ```ignore
//! use icy_gif::{build_gif, GifSettings, SourceFrame, VecSource};
//!
//! let frames = vec![SourceFrame::new(rgba, width, height, Some(80))];
//! let output = build_gif(&mut VecSource::new(frames), &GifSettings::default())?;
//! if !output.within_budget(20_000) {
//!     eprintln!("{} bytes is too large", output.bytes.len());
//! }
//! ```

use thiserror::Error;

pub mod encoder;
pub mod lzw;
pub mod pipeline;
pub mod quant;

pub use encoder::{delay_to_centiseconds, EncoderOptions, Frame, GifEncoder};
pub use pipeline::{
    build_gif, frame_delay_for_fps, sample_frame_indices, target_dimensions, FrameSource, GifOutput,
    GifSettings, SourceFrame, VecSource,
};
pub use quant::{quantize, QuantizeOptions, QuantizedFrame, Rgb};

/// Errors that can occur while quantizing or encoding GIF frames.
#[derive(Debug, Error)]
pub enum GifError {
    /// Invalid image dimensions (width or height is zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A frame was appended without palette or pixel data
    #[error("frame data is incomplete: missing {0}")]
    MissingFrameData(&'static str),

    /// Flattened palette is not a whole number of RGB triples, or too long
    #[error("invalid palette: {0} bytes")]
    InvalidPalette(usize),

    /// An indexed pixel points past the frame's color table
    #[error("palette index {index} out of range for a {table_size} entry color table")]
    IndexOutOfRange { index: u8, table_size: usize },

    /// The frame source did not yield a single frame
    #[error("no frames produced")]
    NoFrames,

    /// A frame source failed to deliver a frame
    #[error("frame source error: {0}")]
    Source(String),
}

/// Result type for GIF operations.
pub type Result<T> = core::result::Result<T, GifError>;

/// Largest color table a GIF frame can carry.
pub const GIF_PALETTE_MAX: usize = 256;
