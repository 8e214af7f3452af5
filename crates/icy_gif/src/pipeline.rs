//! Frame pipeline.
//!
//! Pulls RGBA frames from a [`FrameSource`], quantizes each one and appends it
//! to a [`GifEncoder`] sized from the first frame. Decoding and scaling the
//! frames is the source's job; the helpers in this module compute the sizes
//! and frame selections a source should use.

use crate::encoder::{EncoderOptions, Frame, GifEncoder};
use crate::quant::{quantize, QuantizeOptions, Rgb};
use crate::{GifError, Result};

/// A decoded frame as delivered by a [`FrameSource`].
#[derive(Clone, Debug)]
pub struct SourceFrame {
    /// RGBA pixel data (4 bytes per pixel)
    pub rgba: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Display time; `None` or zero falls back to [`GifSettings::base_delay_ms`].
    pub delay_ms: Option<u32>,
}

impl SourceFrame {
    pub fn new(rgba: Vec<u8>, width: usize, height: usize, delay_ms: Option<u32>) -> Self {
        Self {
            rgba,
            width,
            height,
            delay_ms,
        }
    }
}

/// Anything that can hand out frames one at a time.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<SourceFrame>>;
}

/// Frames already held in memory.
#[derive(Debug)]
pub struct VecSource {
    frames: std::vec::IntoIter<SourceFrame>,
}

impl VecSource {
    pub fn new(frames: Vec<SourceFrame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<SourceFrame>> {
        Ok(self.frames.next())
    }
}

/// Settings for [`build_gif`].
#[derive(Clone, Debug)]
pub struct GifSettings {
    /// Longest side a frame may have in pixels; `None` or zero lifts the limit.
    pub max_dimension: Option<u32>,
    /// Palette size per frame (2-256).
    pub colors: u16,
    /// Frames taken from the source at most.
    pub max_frames: usize,
    /// Output size budget in bytes.
    pub limit_bytes: usize,
    /// Keep transparency. When off, frames are composited onto `background`.
    pub keep_alpha: bool,
    pub dither: bool,
    /// See [`EncoderOptions::loop_count`].
    pub loop_count: Option<u16>,
    /// Delay for frames that do not carry their own.
    pub base_delay_ms: u32,
    pub background: Rgb,
    /// Alpha at or below which a pixel is transparent.
    pub transparent_threshold: u8,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            max_dimension: Some(240),
            colors: 64,
            max_frames: 60,
            limit_bytes: 20_000,
            keep_alpha: true,
            dither: true,
            loop_count: Some(0),
            base_delay_ms: 120,
            background: Rgb::BLACK,
            transparent_threshold: 24,
        }
    }
}

impl GifSettings {
    pub fn quantize_options(&self) -> QuantizeOptions {
        QuantizeOptions {
            max_colors: self.colors,
            preserve_alpha: self.keep_alpha,
            transparent_threshold: self.transparent_threshold,
            dither: self.dither,
            background: self.background,
        }
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            loop_count: self.loop_count,
        }
    }
}

/// A finished GIF with its frame summary.
#[derive(Clone, Debug)]
pub struct GifOutput {
    pub bytes: Vec<u8>,
    pub frames: usize,
    /// Largest palette used by any frame.
    pub colors: usize,
    pub width: u16,
    pub height: u16,
}

impl GifOutput {
    pub fn within_budget(&self, limit_bytes: usize) -> bool {
        self.bytes.len() <= limit_bytes
    }
}

/// Quantize and encode every frame `source` yields, up to `settings.max_frames`.
///
/// The first frame fixes the logical screen size; later frames must match it.
/// Frames are not scaled here, so a source has to deliver them at
/// [`target_dimensions`] for `settings.max_dimension` or smaller.
///
/// # Errors
///
/// Returns [`GifError::NoFrames`] if the source is empty,
/// [`GifError::InvalidDimensions`] if the first frame exceeds
/// `settings.max_dimension`, and passes on source, quantizer and encoder
/// errors.
pub fn build_gif<S: FrameSource + ?Sized>(
    source: &mut S,
    settings: &GifSettings,
) -> Result<GifOutput> {
    let Some(first) = source.next_frame()? else {
        return Err(GifError::NoFrames);
    };
    let (width, height) = screen_size(first.width, first.height)?;
    let fitted = target_dimensions(width as u32, height as u32, settings.max_dimension);
    if fitted != (width as u32, height as u32) {
        return Err(GifError::InvalidDimensions {
            width: first.width,
            height: first.height,
        });
    }
    let mut encoder = GifEncoder::new(width, height, &settings.encoder_options())?;
    let quantize_opts = settings.quantize_options();

    let mut pending = Some(first);
    while encoder.frame_count() < settings.max_frames {
        let frame = match pending.take() {
            Some(frame) => frame,
            None => match source.next_frame()? {
                Some(frame) => frame,
                None => break,
            },
        };
        append_frame(&mut encoder, frame, settings, &quantize_opts)?;
    }

    if encoder.frame_count() == 0 {
        return Err(GifError::NoFrames);
    }
    let frames = encoder.frame_count();
    let colors = encoder.max_color_count();
    let bytes = encoder.finish();

    if bytes.len() > settings.limit_bytes {
        log::warn!(
            "output is {} bytes, over the {} byte budget",
            bytes.len(),
            settings.limit_bytes
        );
    }

    Ok(GifOutput {
        bytes,
        frames,
        colors,
        width,
        height,
    })
}

fn append_frame(
    encoder: &mut GifEncoder,
    mut frame: SourceFrame,
    settings: &GifSettings,
    quantize_opts: &QuantizeOptions,
) -> Result<()> {
    if frame.width != encoder.width() as usize || frame.height != encoder.height() as usize {
        return Err(GifError::InvalidDimensions {
            width: frame.width,
            height: frame.height,
        });
    }
    if !settings.keep_alpha {
        flatten_onto(&mut frame.rgba, settings.background);
    }

    let q = quantize(&frame.rgba, frame.width, frame.height, quantize_opts)?;
    let delay_ms = frame
        .delay_ms
        .filter(|&d| d > 0)
        .unwrap_or(settings.base_delay_ms);
    encoder.add_frame(&Frame {
        indices: &q.indices,
        palette: &q.flat_palette(),
        delay_ms,
        transparent_index: q.transparent_index,
    })?;

    log::debug!(
        "appended frame {} ({} colors, {}ms)",
        encoder.frame_count(),
        q.color_count,
        delay_ms
    );
    Ok(())
}

fn screen_size(width: usize, height: usize) -> Result<(u16, u16)> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(GifError::InvalidDimensions { width, height }),
    }
}

/// Composite RGBA pixels onto an opaque background, leaving every pixel
/// fully opaque.
pub fn flatten_onto(rgba: &mut [u8], background: Rgb) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        let bg = [background.r, background.g, background.b];
        for (c, &b) in px[..3].iter_mut().zip(&bg) {
            *c = ((*c as u32 * a + b as u32 * (255 - a) + 127) / 255) as u8;
        }
        px[3] = 255;
    }
}

/// Output size for a `src_width` x `src_height` source.
///
/// Sources that fit within `max_dimension` keep their size; larger ones are
/// scaled down so the longer side equals it. Sides round half up and never
/// drop below one pixel.
pub fn target_dimensions(
    src_width: u32,
    src_height: u32,
    max_dimension: Option<u32>,
) -> (u32, u32) {
    match max_dimension {
        Some(max) if max > 0 && (src_width > max || src_height > max) => {
            let scale = max as f64 / src_width.max(src_height) as f64;
            let side = |v: u32| ((v as f64 * scale).round() as u32).max(1);
            (side(src_width), side(src_height))
        }
        _ => (src_width.max(1), src_height.max(1)),
    }
}

/// Evenly spaced frame indices for thinning an animation of `total` frames
/// down to at most `max_frames`.
pub fn sample_frame_indices(total: usize, max_frames: usize) -> Vec<usize> {
    let target = max_frames.min(total);
    if target == 0 {
        return Vec::new();
    }
    let step = (total / target).max(1);
    (0..total).step_by(step).take(max_frames).collect()
}

/// Frame delay for sampling at `fps`, never shorter than 20ms.
pub fn frame_delay_for_fps(fps: u32) -> u32 {
    let fps = fps.max(1);
    ((2000 + fps) / (2 * fps)).max(20)
}
