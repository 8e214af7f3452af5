//! Frame source reading still images and animated GIFs from disk.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use icy_gif::{sample_frame_indices, FrameSource, GifError, SourceFrame};
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, ImageFormat, RgbaImage};

/// Reads the given files in order, scaling every frame to one output size.
///
/// Still images become a single frame without a delay of their own.
/// Animated GIFs are thinned to at most `max_frames` frames and keep their
/// per-frame delays.
pub struct FileSource {
    inputs: VecDeque<PathBuf>,
    pending: VecDeque<SourceFrame>,
    width: u32,
    height: u32,
    max_frames: usize,
}

impl FileSource {
    pub fn new(inputs: Vec<PathBuf>, width: u32, height: u32, max_frames: usize) -> Self {
        Self {
            inputs: inputs.into(),
            pending: VecDeque::new(),
            width,
            height,
            max_frames,
        }
    }

    fn load(&mut self, path: &Path) -> icy_gif::Result<()> {
        if is_gif(path) {
            self.load_animation(path)
        } else {
            let img = image::open(path).map_err(|e| open_error(path, e))?;
            let frame = self.scale(img.to_rgba8(), None);
            self.pending.push_back(frame);
            Ok(())
        }
    }

    fn load_animation(&mut self, path: &Path) -> icy_gif::Result<()> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| open_error(path, e))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| open_error(path, e))?;

        let picked = sample_frame_indices(frames.len(), self.max_frames);
        log::debug!(
            "'{}': {} frames, keeping {}",
            path.display(),
            frames.len(),
            picked.len()
        );

        let mut frames: Vec<Option<image::Frame>> = frames.into_iter().map(Some).collect();
        for index in picked {
            let Some(frame) = frames.get_mut(index).and_then(Option::take) else {
                continue;
            };
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom == 0 { 0 } else { numer / denom };
            let scaled = self.scale(frame.into_buffer(), Some(delay_ms));
            self.pending.push_back(scaled);
        }
        Ok(())
    }

    fn scale(&self, img: RgbaImage, delay_ms: Option<u32>) -> SourceFrame {
        let img = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            imageops::resize(&img, self.width, self.height, FilterType::Triangle)
        };
        SourceFrame::new(
            img.into_raw(),
            self.width as usize,
            self.height as usize,
            delay_ms,
        )
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> icy_gif::Result<Option<SourceFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            let Some(path) = self.inputs.pop_front() else {
                return Ok(None);
            };
            self.load(&path)?;
        }
    }
}

pub fn is_gif(path: &Path) -> bool {
    matches!(ImageFormat::from_path(path), Ok(ImageFormat::Gif))
}

fn open_error(path: &Path, err: impl std::fmt::Display) -> GifError {
    GifError::Source(format!("Failed to open '{}': {}", path.display(), err))
}
