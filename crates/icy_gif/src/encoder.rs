//! GIF89a container writer.
//!
//! The header is written when the encoder is created, each call to
//! [`GifEncoder::add_frame`] appends a Graphics Control Extension, an Image
//! Descriptor, a local color table and the LZW payload, and
//! [`GifEncoder::finish`] appends the trailer and hands out the bytes.
//!
//! No global color table is written; every frame carries its own palette.

use crate::{lzw, GifError, Result, GIF_PALETTE_MAX};

const SIGNATURE: &[u8; 6] = b"GIF89a";
const EXTENSION_INTRODUCER: u8 = 0x21;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const IMAGE_SEPARATOR: u8 = 0x2C;
const BLOCK_TERMINATOR: u8 = 0x00;
const TRAILER: u8 = 0x3B;
const NETSCAPE_ID: &[u8; 11] = b"NETSCAPE2.0";
const MAX_SUB_BLOCK: usize = 255;

/// Color resolution 8 bits, no global color table.
const SCREEN_PACKED: u8 = 0b0111_0000;
const LOCAL_TABLE_FLAG: u8 = 0x80;

const DISPOSE_UNSPECIFIED: u8 = 0;
const DISPOSE_BACKGROUND: u8 = 2;

/// Options for [`GifEncoder::new`].
#[derive(Clone, Debug)]
pub struct EncoderOptions {
    /// Netscape looping block: `Some(0)` loops forever, `Some(n)` repeats n
    /// times, `None` omits the block and the animation plays once.
    pub loop_count: Option<u16>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            loop_count: Some(0),
        }
    }
}

/// One indexed frame ready to be written.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Row-major palette indices, exactly `width * height` of them.
    pub indices: &'a [u8],
    /// Flattened RGB triples, 1 to 256 colors.
    pub palette: &'a [u8],
    /// Display time in milliseconds.
    pub delay_ms: u32,
    /// Palette slot drawn as transparent.
    pub transparent_index: Option<u8>,
}

/// Convert a millisecond delay to GIF centiseconds.
///
/// Rounds half up and clamps to 1..=65535, so a zero delay still shows the
/// frame for a tick instead of letting viewers substitute their own default.
pub fn delay_to_centiseconds(delay_ms: u32) -> u16 {
    ((delay_ms as u64 + 5) / 10).clamp(1, u16::MAX as u64) as u16
}

/// Streaming GIF writer. All frames share the logical screen size given at
/// construction.
#[derive(Debug)]
pub struct GifEncoder {
    width: u16,
    height: u16,
    out: Vec<u8>,
    frames: usize,
    max_colors: usize,
}

impl GifEncoder {
    /// Create an encoder and write the file header.
    ///
    /// # Arguments
    /// * `width` - Logical screen width in pixels
    /// * `height` - Logical screen height in pixels
    /// * `opts` - Encoder options
    pub fn new(width: u16, height: u16, opts: &EncoderOptions) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GifError::InvalidDimensions {
                width: width as usize,
                height: height as usize,
            });
        }
        let mut encoder = Self {
            width,
            height,
            out: Vec::new(),
            frames: 0,
            max_colors: 0,
        };
        encoder.write_header(opts.loop_count);
        Ok(encoder)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of frames appended so far.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Largest palette, in colors, of any frame appended so far.
    pub fn max_color_count(&self) -> usize {
        self.max_colors
    }

    fn write_header(&mut self, loop_count: Option<u16>) {
        self.out.extend_from_slice(SIGNATURE);
        write_u16(&mut self.out, self.width);
        write_u16(&mut self.out, self.height);
        // packed fields, background color index, pixel aspect ratio
        self.out.extend_from_slice(&[SCREEN_PACKED, 0, 0]);

        if let Some(count) = loop_count {
            self.out.extend_from_slice(&[
                EXTENSION_INTRODUCER,
                APPLICATION_LABEL,
                NETSCAPE_ID.len() as u8,
            ]);
            self.out.extend_from_slice(NETSCAPE_ID);
            self.out.extend_from_slice(&[3, 1]);
            write_u16(&mut self.out, count);
            self.out.push(BLOCK_TERMINATOR);
        }
    }

    /// Append one frame.
    ///
    /// Frames with a transparent index use disposal "restore to background"
    /// so transparent areas do not show the previous frame; other frames
    /// leave disposal unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the palette or the indices are empty, the palette
    /// is not a whole number of RGB triples (or more than 256 of them), the
    /// index count does not match the screen size, or an index does not fit
    /// the frame's color table.
    pub fn add_frame(&mut self, frame: &Frame<'_>) -> Result<()> {
        if frame.palette.is_empty() {
            return Err(GifError::MissingFrameData("palette"));
        }
        if frame.indices.is_empty() {
            return Err(GifError::MissingFrameData("indexed pixels"));
        }
        if frame.palette.len() % 3 != 0 || frame.palette.len() > GIF_PALETTE_MAX * 3 {
            return Err(GifError::InvalidPalette(frame.palette.len()));
        }
        let expected = self.width as usize * self.height as usize;
        if frame.indices.len() != expected {
            return Err(GifError::BufferSizeMismatch {
                expected,
                actual: frame.indices.len(),
            });
        }

        let color_count = frame.palette.len() / 3;
        let table_size = color_count.next_power_of_two().clamp(2, GIF_PALETTE_MAX);
        let out_of_range = frame
            .transparent_index
            .into_iter()
            .chain(frame.indices.iter().copied())
            .find(|&i| i as usize >= table_size);
        if let Some(index) = out_of_range {
            return Err(GifError::IndexOutOfRange { index, table_size });
        }

        let delay = delay_to_centiseconds(frame.delay_ms);
        self.write_graphic_control(delay, frame.transparent_index);
        self.write_image_descriptor(table_size);

        self.out.extend_from_slice(frame.palette);
        self.out
            .resize(self.out.len() + (table_size - color_count) * 3, 0);

        let min_code_size = lzw::min_code_size(table_size);
        self.out.push(min_code_size);
        let data = lzw::encode(frame.indices, min_code_size);
        write_sub_blocks(&mut self.out, &data);

        self.frames += 1;
        self.max_colors = self.max_colors.max(color_count);

        log::debug!(
            "frame {}: {} colors (table {}), delay {}cs, {} bytes of image data",
            self.frames,
            color_count,
            table_size,
            delay,
            data.len()
        );
        Ok(())
    }

    fn write_graphic_control(&mut self, delay_cs: u16, transparent_index: Option<u8>) {
        let (disposal, flag, index) = match transparent_index {
            Some(index) => (DISPOSE_BACKGROUND, 1, index),
            None => (DISPOSE_UNSPECIFIED, 0, 0),
        };
        self.out
            .extend_from_slice(&[EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL, 4]);
        self.out.push((disposal << 2) | flag);
        write_u16(&mut self.out, delay_cs);
        self.out.extend_from_slice(&[index, BLOCK_TERMINATOR]);
    }

    fn write_image_descriptor(&mut self, table_size: usize) {
        self.out.push(IMAGE_SEPARATOR);
        write_u16(&mut self.out, 0);
        write_u16(&mut self.out, 0);
        write_u16(&mut self.out, self.width);
        write_u16(&mut self.out, self.height);
        let size_field = table_size.trailing_zeros() as u8 - 1;
        self.out.push(LOCAL_TABLE_FLAG | size_field);
    }

    /// Write the trailer and return the finished GIF.
    #[must_use = "this returns the encoded GIF bytes"]
    pub fn finish(mut self) -> Vec<u8> {
        self.out.push(TRAILER);
        log::debug!(
            "finished GIF: {}x{}, {} frames, {} bytes",
            self.width,
            self.height,
            self.frames,
            self.out.len()
        );
        self.out
    }
}

#[inline]
fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Length-prefixed chunks of at most 255 bytes, then a zero-length block.
fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(MAX_SUB_BLOCK) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(BLOCK_TERMINATOR);
}
